//! Error types for Shelf core operations.
//!
//! This module defines well-structured error types using `thiserror` for
//! library-level errors, while higher-level code can use `anyhow` for
//! convenient error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Core error types for Shelf operations.
///
/// The variants fall into two groups that callers treat very differently:
/// store-level failures that prevent the collection from becoming ready
/// (see [`ShelfError::is_fatal`]) and per-file failures that are logged and
/// skipped while the surrounding batch carries on (see
/// [`ShelfError::is_per_file`]).
#[derive(Error, Debug)]
pub enum ShelfError {
    // === Store Errors ===
    /// The index location could not be created or accessed
    #[error("index store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// No index exists at the given location
    #[error("index not found at {path}")]
    IndexNotFound { path: PathBuf },

    /// The index file exists but is corrupted or unreadable
    #[error("index is corrupted: {reason}")]
    IndexCorrupted { reason: String },

    /// The index format version doesn't match the current version
    #[error("index version mismatch: found {found}, expected {expected}")]
    IndexVersionMismatch { found: u32, expected: u32 },

    /// The stored schema differs from the one this build expects
    #[error("index schema mismatch: {reason}")]
    SchemaMismatch { reason: String },

    // === Per-file Errors ===
    /// A single file could not be stat'ed, read or classified
    #[error("cannot index {path}: {reason}")]
    Indexing { path: PathBuf, reason: String },

    // === Query Errors ===
    /// Invalid search pattern (e.g., bad wildcard)
    #[error("invalid search pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The query references a field that cannot be searched that way
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    // === Event Errors ===
    /// A filesystem event is missing information required to apply it
    #[error("invalid filesystem event: {reason}")]
    InvalidEvent { reason: String },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// Serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    // === Internal Errors ===
    /// Internal error that should not happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShelfError {
    /// Returns true if this error prevents the collection from reaching a
    /// ready state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShelfError::StoreUnavailable { .. }
                | ShelfError::IndexNotFound { .. }
                | ShelfError::IndexCorrupted { .. }
                | ShelfError::IndexVersionMismatch { .. }
                | ShelfError::SchemaMismatch { .. }
        )
    }

    /// Returns true if this error concerns a single file and the caller
    /// should skip it and continue.
    pub fn is_per_file(&self) -> bool {
        matches!(self, ShelfError::Indexing { .. })
    }

    /// Create a per-file indexing error
    pub fn indexing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ShelfError::Indexing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a store-unavailable error
    pub fn store_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ShelfError::StoreUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(reason: impl Into<String>) -> Self {
        ShelfError::Serialization(reason.into())
    }
}

impl From<bincode::Error> for ShelfError {
    fn from(err: bincode::Error) -> Self {
        ShelfError::Serialization(err.to_string())
    }
}
