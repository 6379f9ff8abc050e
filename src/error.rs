//! Error types for the detection engine

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors surfaced by the detection core
#[derive(Error, Debug)]
pub enum GuardError {
    /// Reference extension list missing or unreadable. Fatal at startup.
    #[error("reference extension list {path:?} could not be read: {source}")]
    ReferenceList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File disappeared while it was being evaluated
    #[error("file vanished during evaluation: {0:?}")]
    Vanished(PathBuf),

    /// Registering an inotify watch failed
    #[error("failed to watch {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
