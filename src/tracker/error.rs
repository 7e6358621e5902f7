use std::path::PathBuf;

use thiserror::Error;

/// Transition that isn't allowed by the timer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidState {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("no session is running")]
    NotRunning,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidState),

    #[error("Malformed row at line {line} of {}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Malformed project cache {}: {source}", .path.display())]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid timezone \"{input}\" (expected local, utc or an offset like +02:00)")]
    InvalidTimezone { input: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, TrackerError::InvalidState(_))
    }
}
