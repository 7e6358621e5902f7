//! Work timer for the terminal. Start and stop a timer, tag sessions with a project and a task,
//! and see how much time went into the current day and week.
//!
//! Sessions are appended to one file per month, known projects are kept in a small json cache.

pub mod cli;
pub mod config;
pub mod fs;
pub mod tracker;
pub mod utils;
