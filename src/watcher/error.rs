//! Error types for the change detector and relay startup.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Cannot resolve feed location {path}: {reason}")]
    InvalidFeed { path: PathBuf, reason: String },

    #[error("No feed locations configured")]
    NoFeeds,

    #[error("Failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: String,
        source: std::io::Error,
    },

    #[error("Failed to initialize {component}: {reason}")]
    InitFailed { component: String, reason: String },

    #[error("{thread} thread panicked")]
    ThreadPanicked { thread: String },
}
