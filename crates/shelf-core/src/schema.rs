//! Document schema and field derivation.
//!
//! The schema is fixed: seven fields, one of which (`path_with_file_name`) is
//! the unique key. It is persisted alongside the documents so that an index
//! written by an incompatible build is detected on open instead of being
//! silently misread.
//!
//! [`build_fields`] is the only place a [`Document`] is derived from a file on
//! disk. Bulk indexing, reconciliation and the event bridge all go through it.

use crate::classify::Classifier;
use crate::error::{Result, ShelfError};
use crate::types::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, Metadata};
use std::path::Path;

/// The fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    PathWithFileName,
    Path,
    FileNameWithExtension,
    FileName,
    FileSize,
    FileType,
    LastModified,
}

impl Field {
    /// All fields in schema order.
    pub const ALL: [Field; 7] = [
        Field::PathWithFileName,
        Field::Path,
        Field::FileNameWithExtension,
        Field::FileName,
        Field::FileSize,
        Field::FileType,
        Field::LastModified,
    ];

    /// The field's name as exposed to the presentation layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::PathWithFileName => "path_with_file_name",
            Field::Path => "path",
            Field::FileNameWithExtension => "file_name_with_extension",
            Field::FileName => "file_name",
            Field::FileSize => "file_size",
            Field::FileType => "file_type",
            Field::LastModified => "last_modified",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a field is stored and indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Stored verbatim, matched only by exact key
    Id,
    /// Indexed text, searchable by term, wildcard and subtree queries
    Text,
    /// Stored unsigned number
    Numeric,
    /// Stored timestamp with second precision
    DateTime,
}

/// A single schema entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub field: Field,
    pub kind: FieldKind,
    pub stored: bool,
}

/// The set of fields an index stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    entries: Vec<FieldEntry>,
}

impl Schema {
    /// The document schema used by every Shelf index.
    pub fn documents() -> Self {
        let kind = |field| match field {
            Field::PathWithFileName => FieldKind::Id,
            Field::FileSize => FieldKind::Numeric,
            Field::LastModified => FieldKind::DateTime,
            _ => FieldKind::Text,
        };

        Schema {
            entries: Field::ALL
                .iter()
                .map(|&field| FieldEntry {
                    field,
                    kind: kind(field),
                    stored: true,
                })
                .collect(),
        }
    }

    /// All entries in schema order.
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    /// Look up the kind of a field, if the schema contains it.
    pub fn kind(&self, field: Field) -> Option<FieldKind> {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.kind)
    }

    /// Fields that get a term dictionary.
    pub fn text_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.entries
            .iter()
            .filter(|e| e.kind == FieldKind::Text)
            .map(|e| e.field)
    }

    /// Check whether `field` is indexed text.
    pub fn is_text(&self, field: Field) -> bool {
        self.kind(field) == Some(FieldKind::Text)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::documents()
    }
}

/// Read a file's modification time truncated to whole seconds.
///
/// Both stored documents and reconciliation comparisons use this, so a file
/// never looks newer than its own indexed copy on filesystems with
/// sub-second timestamps.
pub fn modified_at(metadata: &Metadata) -> std::io::Result<DateTime<Utc>> {
    let modified: DateTime<Utc> = metadata.modified()?.into();
    Ok(DateTime::from_timestamp(modified.timestamp(), 0).unwrap_or(modified))
}

/// Derive all seven fields of a document from the file at `path`.
///
/// Fails with a per-file [`ShelfError::Indexing`] if the path is not UTF-8,
/// cannot be stat'ed, is not a regular file, or cannot be classified.
pub fn build_fields(path: &Path, classifier: &Classifier) -> Result<Document> {
    let key = path
        .to_str()
        .ok_or_else(|| ShelfError::indexing(path, "path is not valid UTF-8"))?;

    let metadata = fs::metadata(path).map_err(|e| ShelfError::indexing(path, e.to_string()))?;
    if !metadata.is_file() {
        return Err(ShelfError::indexing(path, "not a regular file"));
    }

    let parent = path
        .parent()
        .and_then(|p| p.to_str())
        .ok_or_else(|| ShelfError::indexing(path, "path has no parent directory"))?;
    let file_name_with_extension = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ShelfError::indexing(path, "path has no file name"))?;
    let file_name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name_with_extension);

    let last_modified =
        modified_at(&metadata).map_err(|e| ShelfError::indexing(path, e.to_string()))?;
    let file_type = classifier.classify(path)?.label;

    Ok(Document {
        path_with_file_name: key.to_string(),
        path: parent.to_string(),
        file_name_with_extension: file_name_with_extension.to_string(),
        file_name: file_name.to_string(),
        file_size: metadata.len() / 1000,
        file_type,
        last_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_schema_kinds() {
        let schema = Schema::documents();
        assert_eq!(schema.entries().len(), 7);
        assert_eq!(schema.kind(Field::PathWithFileName), Some(FieldKind::Id));
        assert_eq!(schema.kind(Field::FileSize), Some(FieldKind::Numeric));
        assert_eq!(schema.kind(Field::LastModified), Some(FieldKind::DateTime));
        assert!(schema.is_text(Field::Path));
        assert!(!schema.is_text(Field::PathWithFileName));

        let text: Vec<Field> = schema.text_fields().collect();
        assert_eq!(
            text,
            vec![
                Field::Path,
                Field::FileNameWithExtension,
                Field::FileName,
                Field::FileType
            ]
        );
    }

    #[test]
    fn test_build_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.final.txt");
        fs::write(&path, vec![b'a'; 2500]).unwrap();

        let doc = build_fields(&path, &Classifier::mime_only()).unwrap();

        assert_eq!(doc.path_with_file_name, path.to_str().unwrap());
        assert_eq!(doc.path, temp_dir.path().to_str().unwrap());
        assert_eq!(doc.file_name_with_extension, "report.final.txt");
        assert_eq!(doc.file_name, "report.final");
        assert_eq!(doc.file_size, 2);
        assert_eq!(doc.file_type, "text/plain");

        let on_disk = modified_at(&fs::metadata(&path).unwrap()).unwrap();
        assert_eq!(doc.last_modified, on_disk);
        assert_eq!(doc.last_modified.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_build_fields_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = build_fields(&temp_dir.path().join("gone.txt"), &Classifier::mime_only())
            .unwrap_err();
        assert!(err.is_per_file());
    }

    #[test]
    fn test_build_fields_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = build_fields(temp_dir.path(), &Classifier::mime_only()).unwrap_err();
        assert!(err.is_per_file());
    }
}
