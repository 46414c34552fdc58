//! The index store.
//!
//! The store owns all document state. It supports:
//!
//! - Creating and opening a persistent index at a directory
//! - Batched write sessions with atomic commit
//! - Lock-free reads of the last committed snapshot
//! - Term, wildcard and subtree search over indexed text fields
//!
//! ## Architecture
//!
//! - A [`Snapshot`] is an immutable view: a `Vec` of documents in commit
//!   order, a key -> ids map, and one term dictionary per text field
//!   (`BTreeMap` of lowercased value -> sorted ids) for prefix scans
//! - The current snapshot lives in an `ArcSwap`; readers clone the `Arc` and
//!   never block writers
//! - Writers are serialized by a mutex held for the life of a
//!   [`WriteSession`]; a second `begin_write` waits
//! - `commit` replays the session's staged operations over the current
//!   documents, persists the result, and only then publishes it
//!
//! Commits rewrite every document. Searches vastly outnumber writes, and
//! event-driven writes touch a single document each.
//!
//! Every commit costs O(N) in the collection size, a single-file event
//! included: the index file is rewritten in full and every term dictionary
//! is rebuilt.

use crate::error::{Result, ShelfError};
use crate::persistence::{IndexFile, StoredMeta, INDEX_VERSION};
use crate::query::Query;
use crate::schema::{Field, Schema};
use crate::types::{Document, IndexStats};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// An I/O failure reading an existing index means the store is unavailable.
/// Format errors pass through unchanged.
fn open_failure(location: &Path, err: ShelfError) -> ShelfError {
    match err {
        ShelfError::Io(e) => ShelfError::store_unavailable(location, e.to_string()),
        other => other,
    }
}

/// Position of a document within a snapshot.
pub type DocId = u32;

/// Maximum number of results a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    Unbounded,
    Top(usize),
}

/// A search result with relevance scoring.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matching document
    pub document: Arc<Document>,

    /// Relevance score (higher is more relevant)
    pub score: u32,
}

/// An immutable, committed view of the index.
#[derive(Debug, Default)]
pub struct Snapshot {
    docs: Vec<Arc<Document>>,
    keys: HashMap<String, Vec<DocId>>,
    terms: HashMap<Field, BTreeMap<String, Vec<DocId>>>,
    commit_id: u64,
    committed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn build(
        schema: &Schema,
        docs: Vec<Arc<Document>>,
        commit_id: u64,
        committed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut keys: HashMap<String, Vec<DocId>> = HashMap::with_capacity(docs.len());
        for (id, doc) in docs.iter().enumerate() {
            keys.entry(doc.key().to_string())
                .or_default()
                .push(id as DocId);
        }

        let fields: Vec<Field> = schema.text_fields().collect();
        let terms = fields
            .par_iter()
            .map(|&field| {
                let mut dictionary: BTreeMap<String, Vec<DocId>> = BTreeMap::new();
                for (id, doc) in docs.iter().enumerate() {
                    if let Some(value) = doc.text(field) {
                        dictionary
                            .entry(value.to_lowercase())
                            .or_default()
                            .push(id as DocId);
                    }
                }
                (field, dictionary)
            })
            .collect();

        Snapshot {
            docs,
            keys,
            terms,
            commit_id,
            committed_at,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn commit_id(&self) -> u64 {
        self.commit_id
    }

    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.committed_at
    }

    pub fn get(&self, id: DocId) -> Option<&Arc<Document>> {
        self.docs.get(id as usize)
    }

    /// Documents stored under `key`. More than one only if a caller added
    /// without deleting first.
    pub fn by_key(&self, key: &str) -> impl Iterator<Item = &Document> + '_ {
        self.keys
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|&id| self.get(id).map(|d| d.as_ref()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub(crate) fn terms(&self, field: Field) -> Option<&BTreeMap<String, Vec<DocId>>> {
        self.terms.get(&field)
    }
}

/// All documents of one committed snapshot.
///
/// Iterating does not consume it; it can be walked any number of times and
/// always yields the same documents, regardless of later commits.
#[derive(Debug, Clone)]
pub struct StoredDocuments {
    snapshot: Arc<Snapshot>,
}

impl StoredDocuments {
    pub fn iter(&self) -> impl Iterator<Item = &Document> + '_ {
        self.snapshot.docs.iter().map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn commit_id(&self) -> u64 {
        self.snapshot.commit_id
    }
}

impl<'a> IntoIterator for &'a StoredDocuments {
    type Item = &'a Document;
    type IntoIter = Box<dyn Iterator<Item = &'a Document> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// A staged mutation.
#[derive(Debug, Clone)]
enum WriteOp {
    Add(Document),
    Delete(String),
}

/// What a commit changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    pub commit_id: u64,
    pub added: usize,
    pub deleted: usize,
    pub documents: usize,
}

/// An open write session.
///
/// Holds the store's writer lock until committed or dropped. Dropping
/// without committing discards every staged operation.
pub struct WriteSession<'a> {
    store: &'a IndexStore,
    _guard: MutexGuard<'a, ()>,
    ops: Vec<WriteOp>,
}

impl<'a> WriteSession<'a> {
    /// Stage a new document. Does not remove an existing document with the
    /// same key.
    pub fn add_document(&mut self, document: Document) {
        self.ops.push(WriteOp::Add(document));
    }

    /// Stage removal of every document stored under `key`. A key that is
    /// absent at commit time is ignored.
    pub fn delete_by_key(&mut self, key: &str) {
        self.ops.push(WriteOp::Delete(key.to_string()));
    }

    /// Number of staged operations.
    pub fn pending(&self) -> usize {
        self.ops.len()
    }

    /// Apply every staged operation at once.
    ///
    /// The new state is written to disk before it becomes visible to
    /// readers. If persisting fails, neither disk nor readers see any of
    /// the session's operations.
    pub fn commit(self) -> Result<CommitSummary> {
        let store = self.store;
        let base = store.current.load_full();

        if self.ops.is_empty() {
            return Ok(CommitSummary {
                commit_id: base.commit_id,
                documents: base.len(),
                ..Default::default()
            });
        }

        let mut slots: Vec<Option<Arc<Document>>> = base.docs.iter().cloned().map(Some).collect();
        let mut keys: HashMap<String, Vec<usize>> = base
            .keys
            .iter()
            .map(|(k, ids)| (k.clone(), ids.iter().map(|&id| id as usize).collect()))
            .collect();

        let (mut added, mut deleted) = (0, 0);
        for op in self.ops {
            match op {
                WriteOp::Add(document) => {
                    keys.entry(document.key().to_string())
                        .or_default()
                        .push(slots.len());
                    slots.push(Some(Arc::new(document)));
                    added += 1;
                }
                WriteOp::Delete(key) => {
                    if let Some(ids) = keys.remove(&key) {
                        for id in ids {
                            if slots[id].take().is_some() {
                                deleted += 1;
                            }
                        }
                    }
                }
            }
        }

        let docs: Vec<Arc<Document>> = slots.into_iter().flatten().collect();
        if docs.len() > DocId::MAX as usize {
            return Err(ShelfError::Internal(format!(
                "index cannot hold {} documents",
                docs.len()
            )));
        }

        let meta = StoredMeta {
            schema: store.schema.clone(),
            commit_id: base.commit_id + 1,
            committed_at: Some(Utc::now()),
        };
        store.file.write(&meta, &docs)?;

        let snapshot = Snapshot::build(&store.schema, docs, meta.commit_id, meta.committed_at);
        let summary = CommitSummary {
            commit_id: meta.commit_id,
            added,
            deleted,
            documents: snapshot.len(),
        };
        store.current.store(Arc::new(snapshot));

        debug!(
            commit = summary.commit_id,
            added, deleted,
            documents = summary.documents,
            "Commit published"
        );

        Ok(summary)
    }

    /// Discard every staged operation and release the writer lock.
    pub fn rollback(self) {}
}

/// The persistent index.
///
/// This structure is designed for concurrent access:
/// - Multiple readers can search simultaneously, each against the snapshot
///   current when it started
/// - Write sessions are serialized via an internal lock
pub struct IndexStore {
    location: PathBuf,
    schema: Schema,
    file: IndexFile,
    current: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl IndexStore {
    /// Check whether an index exists at `location`.
    pub fn exists(location: impl AsRef<Path>) -> bool {
        IndexFile::new(location).exists()
    }

    /// Create a new, empty index at `location`, replacing any index already
    /// there. The directory is created if absent.
    #[instrument(skip_all, fields(location = %location.as_ref().display()))]
    pub fn create(location: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        fs::create_dir_all(&location)
            .map_err(|e| ShelfError::store_unavailable(&location, e.to_string()))?;

        let file = IndexFile::new(&location);
        let meta = StoredMeta {
            schema: schema.clone(),
            commit_id: 0,
            committed_at: None,
        };
        file.write(&meta, &[])
            .map_err(|e| ShelfError::store_unavailable(&location, e.to_string()))?;

        info!("Index store created");
        Ok(Self::from_parts(location, schema, file, Vec::new(), 0, None))
    }

    /// Open the index at `location`.
    #[instrument(skip_all, fields(location = %location.as_ref().display()))]
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        let file = IndexFile::new(&location);
        if !file.exists() {
            return Err(ShelfError::IndexNotFound { path: location });
        }

        let (meta, documents) = file.read().map_err(|e| open_failure(&location, e))?;
        let docs = documents.into_iter().map(Arc::new).collect();

        let store = Self::from_parts(
            location,
            meta.schema,
            file,
            docs,
            meta.commit_id,
            meta.committed_at,
        );
        info!(
            documents = store.len(),
            commit = meta.commit_id,
            "Index store opened"
        );
        Ok(store)
    }

    fn from_parts(
        location: PathBuf,
        schema: Schema,
        file: IndexFile,
        docs: Vec<Arc<Document>>,
        commit_id: u64,
        committed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let snapshot = Snapshot::build(&schema, docs, commit_id, committed_at);
        IndexStore {
            location,
            schema,
            file,
            current: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(()),
        }
    }

    /// Set whether future commits compress document chunks.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.file = self.file.with_compression(compress);
        self
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Open a write session, waiting for any session already open.
    pub fn begin_write(&self) -> WriteSession<'_> {
        WriteSession {
            store: self,
            _guard: self.writer.lock(),
            ops: Vec::new(),
        }
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Every stored document as of the last commit.
    pub fn read_all(&self) -> StoredDocuments {
        StoredDocuments {
            snapshot: self.snapshot(),
        }
    }

    /// Run `query` against the last committed snapshot.
    ///
    /// Results are ordered by descending score (shorter file names first),
    /// then by commit order.
    pub fn search(&self, query: &Query, limit: Limit) -> Result<Vec<SearchHit>> {
        query.validate(&self.schema)?;

        let snapshot = self.snapshot();
        let mut hits: Vec<(DocId, SearchHit)> = query
            .evaluate(&snapshot)
            .into_iter()
            .filter_map(|id| {
                snapshot.get(id).map(|document| {
                    let hit = SearchHit {
                        score: compute_score(document),
                        document: Arc::clone(document),
                    };
                    (id, hit)
                })
            })
            .collect();

        hits.sort_by(|(a_id, a), (b_id, b)| b.score.cmp(&a.score).then(a_id.cmp(b_id)));
        if let Limit::Top(n) = limit {
            hits.truncate(n);
        }

        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        IndexStats {
            documents: snapshot.len() as u64,
            total_kilobytes: snapshot.docs.iter().map(|d| d.file_size).sum(),
            commit_id: snapshot.commit_id,
            last_commit: snapshot.committed_at,
            version: INDEX_VERSION,
        }
    }

    /// Delete the index at `location` from disk.
    pub fn remove(location: impl AsRef<Path>) -> Result<()> {
        IndexFile::new(location).clear()
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("location", &self.location)
            .field("documents", &self.len())
            .field("commit_id", &self.current.load().commit_id)
            .finish()
    }
}

/// Shorter names are generally more relevant (more specific).
fn compute_score(document: &Document) -> u32 {
    1000u32.saturating_sub(document.file_name_with_extension.chars().count() as u32)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use crossbeam_channel::bounded;
    use std::thread;
    use tempfile::TempDir;

    pub(crate) fn make_document(key: &str) -> Document {
        let path = Path::new(key);
        let name = path.file_name().unwrap().to_str().unwrap();
        Document {
            path_with_file_name: key.to_string(),
            path: path.parent().unwrap().to_str().unwrap().to_string(),
            file_name_with_extension: name.to_string(),
            file_name: path.file_stem().unwrap().to_str().unwrap().to_string(),
            file_size: 4,
            file_type: "text/plain".to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    fn new_store() -> (TempDir, IndexStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::create(temp_dir.path().join("index"), Schema::documents()).unwrap();
        (temp_dir, store)
    }

    fn stored_keys(store: &IndexStore) -> Vec<String> {
        let mut keys: Vec<String> = store.read_all().iter().map(|d| d.key().to_string()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_create_and_open() {
        let (temp_dir, store) = new_store();
        assert!(store.is_empty());
        assert_eq!(store.stats().commit_id, 0);

        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.add_document(make_document("/docs/b.txt"));
        let summary = session.commit().unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.commit_id, 1);
        drop(store);

        let location = temp_dir.path().join("index");
        assert!(IndexStore::exists(&location));
        let reopened = IndexStore::open(&location).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.stats().commit_id, 1);
        assert!(reopened.stats().last_commit.is_some());
        assert_eq!(reopened.schema(), &Schema::documents());
    }

    #[test]
    fn test_open_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = IndexStore::open(temp_dir.path()).unwrap_err();
        assert!(matches!(err, ShelfError::IndexNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_open_read_failure_is_fatal() {
        let location = Path::new("/var/lib/shelf/index");
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);

        let err = open_failure(location, ShelfError::Io(denied));
        assert!(err.is_fatal());
        match err {
            ShelfError::StoreUnavailable { path, .. } => assert_eq!(path, location),
            other => panic!("unexpected error: {:?}", other),
        }

        let corrupted = ShelfError::IndexCorrupted {
            reason: "bad footer".to_string(),
        };
        assert!(matches!(
            open_failure(location, corrupted),
            ShelfError::IndexCorrupted { .. }
        ));
    }

    #[test]
    fn test_create_inaccessible() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let err = IndexStore::create(blocker.join("index"), Schema::documents()).unwrap_err();
        assert!(matches!(err, ShelfError::StoreUnavailable { .. }));
    }

    #[test]
    fn test_add_does_not_replace() {
        let (_dir, store) = new_store();
        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.commit().unwrap();

        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.commit().unwrap();
        assert_eq!(store.snapshot().by_key("/docs/a.txt").count(), 2);

        let mut session = store.begin_write();
        session.delete_by_key("/docs/a.txt");
        let summary = session.commit().unwrap();
        assert_eq!(summary.deleted, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_then_add_in_one_session() {
        let (_dir, store) = new_store();
        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.commit().unwrap();

        let mut replacement = make_document("/docs/a.txt");
        replacement.file_size = 99;
        let mut session = store.begin_write();
        session.delete_by_key("/docs/a.txt");
        session.add_document(replacement);
        session.commit().unwrap();

        let snapshot = store.snapshot();
        let docs: Vec<&Document> = snapshot.by_key("/docs/a.txt").collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_size, 99);
    }

    #[test]
    fn test_delete_absent_key_is_noop() {
        let (_dir, store) = new_store();
        let mut session = store.begin_write();
        session.delete_by_key("/docs/missing.txt");
        let summary = session.commit().unwrap();
        assert_eq!(summary.deleted, 0);
        assert_eq!(summary.documents, 0);
    }

    #[test]
    fn test_dropped_session_discards() {
        let (_dir, store) = new_store();
        {
            let mut session = store.begin_write();
            session.add_document(make_document("/docs/a.txt"));
            assert_eq!(session.pending(), 1);
        }
        assert!(store.is_empty());

        let mut session = store.begin_write();
        session.add_document(make_document("/docs/b.txt"));
        session.rollback();
        assert!(store.is_empty());
        assert_eq!(store.stats().commit_id, 0);
    }

    #[test]
    fn test_uncommitted_session_survives_reopen_as_prior_state() {
        let (temp_dir, store) = new_store();
        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.commit().unwrap();

        let mut session = store.begin_write();
        session.delete_by_key("/docs/a.txt");
        session.add_document(make_document("/docs/b.txt"));
        drop(session);
        drop(store);

        let reopened = IndexStore::open(temp_dir.path().join("index")).unwrap();
        assert_eq!(stored_keys(&reopened), vec!["/docs/a.txt"]);
    }

    #[test]
    fn test_read_all_is_restartable_snapshot() {
        let (_dir, store) = new_store();
        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.add_document(make_document("/docs/b.txt"));
        session.commit().unwrap();

        let stored = store.read_all();

        let mut session = store.begin_write();
        session.delete_by_key("/docs/a.txt");
        session.commit().unwrap();

        assert_eq!(stored.iter().count(), 2);
        assert_eq!((&stored).into_iter().count(), 2);
        assert_eq!(store.read_all().len(), 1);
    }

    #[test]
    fn test_search_ordering_and_limit() {
        let (_dir, store) = new_store();
        let mut session = store.begin_write();
        session.add_document(make_document("/docs/longer_name.txt"));
        session.add_document(make_document("/docs/ab.txt"));
        session.add_document(make_document("/docs/cd.txt"));
        session.commit().unwrap();

        let query = Query::contains(Field::FileNameWithExtension, ".txt").unwrap();
        let hits = store.search(&query, Limit::Unbounded).unwrap();
        let keys: Vec<&str> = hits.iter().map(|h| h.document.key()).collect();
        assert_eq!(keys, vec!["/docs/ab.txt", "/docs/cd.txt", "/docs/longer_name.txt"]);

        let hits = store.search(&query, Limit::Top(1)).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_rejects_invalid_query() {
        let (_dir, store) = new_store();
        let err = store
            .search(&Query::term(Field::PathWithFileName, "/docs/a.txt"), Limit::Unbounded)
            .unwrap_err();
        assert!(matches!(err, ShelfError::InvalidQuery { .. }));
    }

    #[test]
    fn test_second_writer_waits() {
        let (_dir, store) = new_store();
        let store = Arc::new(store);

        let mut session = store.begin_write();
        session.add_document(make_document("/docs/first.txt"));

        let (started_tx, started_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                started_tx.send(()).unwrap();
                let mut session = store.begin_write();
                session.add_document(make_document("/docs/second.txt"));
                let summary = session.commit().unwrap();
                done_tx.send(summary.commit_id).unwrap();
            })
        };

        started_rx.recv().unwrap();
        assert!(done_rx
            .recv_timeout(std::time::Duration::from_millis(100))
            .is_err());

        assert_eq!(session.commit().unwrap().commit_id, 1);
        assert_eq!(done_rx.recv().unwrap(), 2);
        writer.join().unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_search_during_open_session_sees_committed_state() {
        let (_dir, store) = new_store();
        let store = Arc::new(store);

        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.commit().unwrap();

        let mut session = store.begin_write();
        session.delete_by_key("/docs/a.txt");
        session.add_document(make_document("/docs/b.txt"));

        let (tx, rx) = bounded(1);
        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let hits = store.search(&Query::All, Limit::Unbounded).unwrap();
                let keys: Vec<String> = hits.iter().map(|h| h.document.key().to_string()).collect();
                tx.send(keys).unwrap();
            })
        };

        assert_eq!(rx.recv().unwrap(), vec!["/docs/a.txt".to_string()]);
        reader.join().unwrap();

        session.commit().unwrap();
        assert_eq!(stored_keys(&store), vec!["/docs/b.txt"]);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_state() {
        let (_dir, store) = new_store();
        let store = Arc::new(store);

        let mut session = store.begin_write();
        session.add_document(make_document("/docs/0/a.txt"));
        session.add_document(make_document("/docs/0/b.txt"));
        session.commit().unwrap();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let stored = store.read_all();
                    // Every commit swaps both documents of one directory at once
                    let dirs: std::collections::HashSet<&str> =
                        stored.iter().map(|d| d.path.as_str()).collect();
                    assert_eq!(stored.len(), 2);
                    assert_eq!(dirs.len(), 1);
                }
            })
        };

        for i in 1..20 {
            let prev = i - 1;
            let mut session = store.begin_write();
            session.delete_by_key(&format!("/docs/{}/a.txt", prev));
            session.delete_by_key(&format!("/docs/{}/b.txt", prev));
            session.add_document(make_document(&format!("/docs/{}/a.txt", i)));
            session.add_document(make_document(&format!("/docs/{}/b.txt", i)));
            session.commit().unwrap();
        }

        reader.join().unwrap();
    }

    #[test]
    fn test_stats() {
        let (_dir, store) = new_store();
        let mut session = store.begin_write();
        session.add_document(make_document("/docs/a.txt"));
        session.add_document(make_document("/docs/b.txt"));
        session.commit().unwrap();

        let stats = store.stats();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.total_kilobytes, 8);
        assert_eq!(stats.version, INDEX_VERSION);
    }

    #[test]
    fn test_remove() {
        let (temp_dir, store) = new_store();
        let location = store.location().to_path_buf();
        drop(store);

        IndexStore::remove(&location).unwrap();
        assert!(!IndexStore::exists(&location));
        assert!(temp_dir.path().exists());
    }
}
