//! Error types for the watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while starting or running a watcher.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The root to watch is missing or not a directory
    #[error("cannot watch {path}: not a directory")]
    RootNotFound { path: PathBuf },

    /// The native notification backend failed
    #[error("notification backend error: {0}")]
    Notify(#[from] notify::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Check if the OS refused more watches (e.g. the inotify watch limit)
    pub fn is_watch_limit(&self) -> bool {
        matches!(
            self,
            WatchError::Notify(notify::Error {
                kind: notify::ErrorKind::MaxFilesWatch,
                ..
            })
        )
    }
}
