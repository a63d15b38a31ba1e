//! Error types for persistence.

use std::fmt;
use std::io;

/// Errors from reading or writing persisted state.
#[derive(Debug)]
pub enum PersistError {
    /// An I/O error occurred during read, write, or rename.
    Io(io::Error),
    /// A document could not be encoded or decoded.
    Json(serde_json::Error),
    /// The background worker could not be started or has gone away.
    Worker(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "malformed document: {e}"),
            Self::Worker(detail) => write!(f, "persistence worker: {detail}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Worker(_) => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
