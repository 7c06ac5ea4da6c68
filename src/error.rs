//! Error types for Postura

use thiserror::Error;

/// Errors that can occur while tracking, persisting or summarizing sessions
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unknown tracking mode: {0:?} (expected \"posture\", \"focus\" or both)")]
    UnknownMode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Announcement failed: {0}")]
    Announce(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
