//! Small file helpers shared by the storage layer.

pub mod operations;
