//! Core data types for Shelf.
//!
//! This module defines the record stored for every indexed file. These types
//! are designed to be:
//!
//! - **Serializable**: For persistence to disk and for the presentation wire
//!   shape (`last_modified` serializes as an ISO-8601 string)
//! - **Platform-agnostic**: Paths are carried as the strings used for keys
//! - **Self-contained**: A document never refers to another document

use crate::schema::Field;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single indexed file.
///
/// `path_with_file_name` is the sole identity of a document; the store keeps
/// at most one document per key as long as callers delete before re-adding.
///
/// ## Design Notes
///
/// - `path`, `file_name_with_extension`, `file_name` and `file_type` are
///   indexed text fields, searchable through the store's term dictionaries
/// - `file_size` is in kilobytes (bytes / 1000, truncated)
/// - `last_modified` has second precision, so it can be compared directly
///   with a freshly read on-disk timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Absolute file path including the file name (unique key)
    pub path_with_file_name: String,

    /// Absolute parent directory path
    pub path: String,

    /// Base file name including extension (e.g., "invoice_2024.pdf")
    pub file_name_with_extension: String,

    /// Base file name without extension (e.g., "invoice_2024")
    pub file_name: String,

    /// File size in kilobytes
    pub file_size: u64,

    /// Application/type name from the association registry, or a MIME type
    pub file_type: String,

    /// Modification time at index time, truncated to whole seconds
    pub last_modified: DateTime<Utc>,
}

impl Document {
    /// The document's key.
    pub fn key(&self) -> &str {
        &self.path_with_file_name
    }

    /// Get the value of a text field, if `field` is one.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::PathWithFileName => Some(&self.path_with_file_name),
            Field::Path => Some(&self.path),
            Field::FileNameWithExtension => Some(&self.file_name_with_extension),
            Field::FileName => Some(&self.file_name),
            Field::FileType => Some(&self.file_type),
            Field::FileSize | Field::LastModified => None,
        }
    }

    /// Get the file extension (without the dot), if any
    pub fn extension(&self) -> Option<&str> {
        self.file_name_with_extension
            .strip_prefix(self.file_name.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|ext| !ext.is_empty())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_with_file_name)
    }
}

/// Statistics about the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of documents in the last committed snapshot
    pub documents: u64,

    /// Sum of `file_size` over all documents, in kilobytes
    pub total_kilobytes: u64,

    /// Monotonic commit counter (0 for a freshly created store)
    pub commit_id: u64,

    /// When the last commit was published
    pub last_commit: Option<DateTime<Utc>>,

    /// Index format version
    pub version: u32,
}
