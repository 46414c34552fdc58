//! On-disk format of the index store.
//!
//! Every commit rewrites the full document set. The on-disk format is
//! designed for:
//!
//! - Atomic commits: write to a temp file, fsync, then rename over the
//!   current file, so a crash never leaves a half-written index in place
//! - Versioning: format changes are detected on open
//! - Integrity: a CRC32 over the body detects corruption
//! - Fast loading: chunks are decoded in parallel
//!
//! Term dictionaries are not stored; they are rebuilt from the documents
//! when a snapshot is published.
//!
//! ## Index File Format
//!
//! ```text
//! [Header: 32 bytes]
//!   - Magic: "SHLF" (4 bytes)
//!   - Version: u32 (4 bytes)
//!   - Flags: u32 (4 bytes) - compression
//!   - Document count: u64 (8 bytes)
//!   - Reserved: 12 bytes
//!
//! [Body]
//!   - Meta length: u32, meta (bincode: schema, commit id, commit time)
//!   - Chunk count: u32
//!   - For each chunk: length u32, documents (bincode, optionally LZ4)
//!
//! [Footer: 8 bytes]
//!   - CRC32 checksum of the body: u32
//!   - Magic: "FLHS" (4 bytes)
//! ```

use crate::error::{Result, ShelfError};
use crate::schema::Schema;
use crate::types::Document;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Magic bytes at the start of index files
pub const MAGIC_HEADER: &[u8; 4] = b"SHLF";
/// Magic bytes at the end of index files (reversed)
pub const MAGIC_FOOTER: &[u8; 4] = b"FLHS";
/// Current index format version
pub const INDEX_VERSION: u32 = 1;

const HEADER_LEN: usize = 32;
const FOOTER_LEN: usize = 8;
const CHUNK_SIZE: usize = 50_000;

/// Flags for index file format
#[derive(Debug, Clone, Copy)]
pub struct IndexFlags(u32);

impl IndexFlags {
    /// No compression
    pub const NONE: Self = IndexFlags(0);
    /// LZ4 compression
    pub const COMPRESSED_LZ4: Self = IndexFlags(1);

    fn is_compressed(&self) -> bool {
        self.0 & 1 != 0
    }
}

/// Header structure for the index file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexHeader {
    magic: [u8; 4],
    version: u32,
    flags: u32,
    document_count: u64,
    reserved: [u8; 12],
}

impl IndexHeader {
    fn new(document_count: u64, flags: IndexFlags) -> Self {
        IndexHeader {
            magic: *MAGIC_HEADER,
            version: INDEX_VERSION,
            flags: flags.0,
            document_count,
            reserved: [0; 12],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.magic != *MAGIC_HEADER {
            return Err(ShelfError::IndexCorrupted {
                reason: "Invalid magic bytes in header".to_string(),
            });
        }
        if self.version != INDEX_VERSION {
            return Err(ShelfError::IndexVersionMismatch {
                found: self.version,
                expected: INDEX_VERSION,
            });
        }
        Ok(())
    }
}

/// Commit metadata stored ahead of the documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeta {
    pub schema: Schema,
    pub commit_id: u64,
    pub committed_at: Option<DateTime<Utc>>,
}

/// Reads and writes the index file in one directory.
#[derive(Debug, Clone)]
pub struct IndexFile {
    /// Directory holding the index
    base_dir: PathBuf,

    /// Whether to use compression
    use_compression: bool,
}

impl IndexFile {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        IndexFile {
            base_dir: base_dir.as_ref().to_path_buf(),
            use_compression: true,
        }
    }

    /// Set whether to use compression when writing.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.use_compression = compress;
        self
    }

    /// Get the path to the main index file.
    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join("shelf.idx")
    }

    /// Get the path to a temporary file during a commit.
    fn temp_path(&self) -> PathBuf {
        self.base_dir.join("shelf.idx.tmp")
    }

    /// Check if an index file exists.
    pub fn exists(&self) -> bool {
        self.index_path().is_file()
    }

    /// Write a full document set, replacing the current file atomically.
    pub fn write(&self, meta: &StoredMeta, documents: &[Arc<Document>]) -> Result<()> {
        let flags = if self.use_compression {
            IndexFlags::COMPRESSED_LZ4
        } else {
            IndexFlags::NONE
        };

        let mut body = Vec::new();
        let meta_bytes = bincode::serialize(meta)?;
        body.extend_from_slice(&(meta_bytes.len() as u32).to_le_bytes());
        body.extend_from_slice(&meta_bytes);

        let chunks: Vec<&[Arc<Document>]> = documents.chunks(CHUNK_SIZE).collect();
        body.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

        let blobs: Vec<Vec<u8>> = chunks
            .par_iter()
            .map(|chunk| -> Result<Vec<u8>> {
                let refs: Vec<&Document> = chunk.iter().map(|d| d.as_ref()).collect();
                let bytes = bincode::serialize(&refs)?;
                Ok(if flags.is_compressed() {
                    lz4_flex::compress_prepend_size(&bytes)
                } else {
                    bytes
                })
            })
            .collect::<Result<_>>()?;

        for blob in &blobs {
            body.extend_from_slice(&(blob.len() as u32).to_le_bytes());
            body.extend_from_slice(blob);
        }

        let temp_path = self.temp_path();
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);

            let header = IndexHeader::new(documents.len() as u64, flags);
            writer.write_all(&bincode::serialize(&header)?)?;
            writer.write_all(&body)?;
            writer.write_all(&crc32fast::hash(&body).to_le_bytes())?;
            writer.write_all(MAGIC_FOOTER)?;

            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, self.index_path())?;

        debug!(
            path = %self.index_path().display(),
            documents = documents.len(),
            commit = meta.commit_id,
            compressed = flags.is_compressed(),
            "Index file written"
        );

        Ok(())
    }

    /// Read the index file.
    pub fn read(&self) -> Result<(StoredMeta, Vec<Document>)> {
        let index_path = self.index_path();

        if !index_path.exists() {
            return Err(ShelfError::IndexNotFound { path: index_path });
        }

        let file = File::open(&index_path)?;
        let file_len = file.metadata()?.len() as usize;
        if file_len < HEADER_LEN + FOOTER_LEN {
            return Err(ShelfError::IndexCorrupted {
                reason: format!("File too short ({} bytes)", file_len),
            });
        }
        let mut reader = BufReader::new(file);

        let mut header_bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut header_bytes)?;
        let header: IndexHeader =
            bincode::deserialize(&header_bytes).map_err(|e| ShelfError::IndexCorrupted {
                reason: format!("Header unreadable: {}", e),
            })?;
        header.validate()?;
        let flags = IndexFlags(header.flags);

        let mut body = vec![0u8; file_len - HEADER_LEN - FOOTER_LEN];
        reader.read_exact(&mut body)?;

        let mut footer = [0u8; FOOTER_LEN];
        reader.read_exact(&mut footer)?;
        if &footer[4..8] != MAGIC_FOOTER {
            return Err(ShelfError::IndexCorrupted {
                reason: "Invalid footer magic bytes".to_string(),
            });
        }

        let stored_checksum = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let computed_checksum = crc32fast::hash(&body);
        if stored_checksum != computed_checksum {
            return Err(ShelfError::IndexCorrupted {
                reason: format!(
                    "Checksum mismatch: expected {:08x}, got {:08x}",
                    stored_checksum, computed_checksum
                ),
            });
        }

        let mut cursor = BodyCursor::new(&body);
        let meta_bytes = cursor.take_prefixed("meta")?;
        let meta: StoredMeta =
            bincode::deserialize(meta_bytes).map_err(|e| ShelfError::IndexCorrupted {
                reason: format!("Meta deserialization failed: {}", e),
            })?;

        let chunk_count = cursor.take_u32("chunk count")? as usize;
        let mut blobs = Vec::with_capacity(chunk_count);
        for _ in 0..chunk_count {
            blobs.push(cursor.take_prefixed("chunk")?);
        }

        let chunks: Vec<Vec<Document>> = blobs
            .par_iter()
            .map(|blob| {
                let bytes = if flags.is_compressed() {
                    lz4_flex::decompress_size_prepended(blob).map_err(|e| {
                        ShelfError::IndexCorrupted {
                            reason: format!("Decompression failed: {}", e),
                        }
                    })?
                } else {
                    blob.to_vec()
                };
                bincode::deserialize::<Vec<Document>>(&bytes).map_err(|e| {
                    ShelfError::IndexCorrupted {
                        reason: format!("Deserialization failed: {}", e),
                    }
                })
            })
            .collect::<Result<_>>()?;

        let documents: Vec<Document> = chunks.into_iter().flatten().collect();
        if documents.len() as u64 != header.document_count {
            return Err(ShelfError::IndexCorrupted {
                reason: format!(
                    "Header announces {} documents, found {}",
                    header.document_count,
                    documents.len()
                ),
            });
        }

        info!(
            path = %index_path.display(),
            documents = documents.len(),
            commit = meta.commit_id,
            "Index file loaded"
        );

        Ok((meta, documents))
    }

    /// Delete all stored index data.
    pub fn clear(&self) -> Result<()> {
        for path in [self.index_path(), self.temp_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Sequential reader over the length-prefixed body sections.
struct BodyCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BodyCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        BodyCursor { data, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        let end = end.ok_or_else(|| ShelfError::IndexCorrupted {
            reason: format!("Truncated {}", what),
        })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_prefixed(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.take_u32(what)? as usize;
        self.take(len, what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn make_documents(count: usize) -> Vec<Arc<Document>> {
        (0..count)
            .map(|i| {
                Arc::new(Document {
                    path_with_file_name: format!("/docs/file{}.txt", i),
                    path: "/docs".to_string(),
                    file_name_with_extension: format!("file{}.txt", i),
                    file_name: format!("file{}", i),
                    file_size: i as u64,
                    file_type: "text/plain".to_string(),
                    last_modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                })
            })
            .collect()
    }

    fn make_meta(commit_id: u64) -> StoredMeta {
        StoredMeta {
            schema: Schema::documents(),
            commit_id,
            committed_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path());

        file.write(&make_meta(3), &make_documents(10)).unwrap();
        assert!(file.exists());

        let (meta, documents) = file.read().unwrap();
        assert_eq!(meta, make_meta(3));
        assert_eq!(documents.len(), 10);
        assert_eq!(documents[7].file_name, "file7");
    }

    #[test]
    fn test_write_and_read_uncompressed() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path()).with_compression(false);

        file.write(&make_meta(1), &make_documents(3)).unwrap();
        let (_, documents) = file.read().unwrap();
        assert_eq!(documents.len(), 3);
    }

    #[test]
    fn test_rewrite_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path());

        file.write(&make_meta(1), &make_documents(5)).unwrap();
        file.write(&make_meta(2), &make_documents(2)).unwrap();

        let (meta, documents) = file.read().unwrap();
        assert_eq!(meta.commit_id, 2);
        assert_eq!(documents.len(), 2);
        assert!(!file.temp_path().exists());
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let result = IndexFile::new(temp_dir.path()).read();
        assert!(matches!(result, Err(ShelfError::IndexNotFound { .. })));
    }

    #[test]
    fn test_corrupted_index() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("shelf.idx"), b"not a valid index file at all!!!!!!!!")
            .unwrap();

        let result = IndexFile::new(temp_dir.path()).read();
        assert!(matches!(result, Err(ShelfError::IndexCorrupted { .. })));
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path());
        file.write(&make_meta(1), &make_documents(4)).unwrap();

        let mut bytes = fs::read(file.index_path()).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;
        fs::write(file.index_path(), bytes).unwrap();

        let err = file.read().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path());
        file.write(&make_meta(0), &[]).unwrap();
        assert!(file.exists());

        file.clear().unwrap();
        assert!(!file.exists());
    }
}
