//!  Storage is organized through [session_storage::SessionStorageImpl] and
//!  [project_cache::ProjectCacheFile].
//!  The basic idea is:
//!   - There is a directory with one session file per calendar month (`YYYY-MM.csv`).
//!   - Session files are append only. Each row is a finished session as UTC epoch seconds.
//!   - Known projects and their tasks live in a small json file that is rewritten on change.
//!
//!  Neither file is safe to share between two running instances. Appends are locked, but each
//!  instance keeps its own view of the month and the last one to save the project cache wins.

pub mod csv;
pub mod entities;
pub mod project_cache;
pub mod session_storage;
