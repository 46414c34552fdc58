//! Filesystem events and the bridge that turns them into index mutations.
//!
//! An external watcher produces [`FsEvent`]s and hands them to an
//! [`EventConsumer`]. The core never constructs a watcher; it only
//! implements the consumer side:
//!
//! - [`IndexBridge`] applies each event to the store as one transaction
//! - [`ChannelEventConsumer`] forwards events over a channel, so a single
//!   thread can drain them in delivery order

use crate::classify::Classifier;
use crate::config::ExcludeRules;
use crate::error::{Result, ShelfError};
use crate::schema::build_fields;
use crate::store::IndexStore;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The kind of change that occurred to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// A new file or directory was created
    Created,

    /// File contents or metadata were modified
    Modified,

    /// A file or directory was renamed or moved
    Moved,

    /// A file or directory was deleted
    Deleted,
}

impl fmt::Display for FsEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsEventKind::Created => write!(f, "created"),
            FsEventKind::Modified => write!(f, "modified"),
            FsEventKind::Moved => write!(f, "moved"),
            FsEventKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// A filesystem change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// The kind of change
    pub kind: FsEventKind,

    /// Whether this is a directory
    pub is_directory: bool,

    /// The affected path (the source path for moves)
    pub path: PathBuf,

    /// For move operations, the destination path
    pub dest_path: Option<PathBuf>,
}

impl FsEvent {
    /// Create a create event
    pub fn created(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        FsEvent {
            kind: FsEventKind::Created,
            is_directory,
            path: path.into(),
            dest_path: None,
        }
    }

    /// Create a modify event
    pub fn modified(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        FsEvent {
            kind: FsEventKind::Modified,
            is_directory,
            path: path.into(),
            dest_path: None,
        }
    }

    /// Create a move event
    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>, is_directory: bool) -> Self {
        FsEvent {
            kind: FsEventKind::Moved,
            is_directory,
            path: from.into(),
            dest_path: Some(to.into()),
        }
    }

    /// Create a delete event
    pub fn deleted(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        FsEvent {
            kind: FsEventKind::Deleted,
            is_directory,
            path: path.into(),
            dest_path: None,
        }
    }
}

impl fmt::Display for FsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())?;
        if let Some(ref dest) = self.dest_path {
            write!(f, " -> {}", dest.display())?;
        }
        Ok(())
    }
}

/// Receiver of filesystem events.
///
/// Watchers call methods on this consumer from their own notification
/// thread, in the order they observed the changes.
pub trait EventConsumer: Send + Sync {
    /// Called when a filesystem change is detected
    fn on_event(&self, event: FsEvent);

    /// Called when an error occurs during watching
    fn on_error(&self, error: String);
}

/// Messages sent by the channel consumer
#[derive(Debug, Clone)]
pub enum EventMessage {
    /// A change event
    Event(FsEvent),
    /// An error occurred
    Error(String),
}

/// A channel-based event consumer implementation
pub struct ChannelEventConsumer {
    sender: crossbeam_channel::Sender<EventMessage>,
}

impl ChannelEventConsumer {
    /// Create a new channel-based consumer
    pub fn new() -> (Self, crossbeam_channel::Receiver<EventMessage>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (ChannelEventConsumer { sender }, receiver)
    }
}

impl EventConsumer for ChannelEventConsumer {
    fn on_event(&self, event: FsEvent) {
        let _ = self.sender.send(EventMessage::Event(event));
    }

    fn on_error(&self, error: String) {
        let _ = self.sender.send(EventMessage::Error(error));
    }
}

/// What applying an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The index mutation was committed
    Applied,
    /// The event does not concern the index (directory or excluded path)
    Ignored,
    /// The replacement document could not be built; any staged delete was
    /// still committed
    Skipped,
}

/// Applies filesystem events to an index store.
pub struct IndexBridge {
    store: Arc<IndexStore>,
    classifier: Arc<Classifier>,
    root: PathBuf,
    rules: ExcludeRules,
}

impl IndexBridge {
    pub fn new(store: Arc<IndexStore>, classifier: Arc<Classifier>, root: impl Into<PathBuf>) -> Self {
        IndexBridge {
            store,
            classifier,
            root: root.into(),
            rules: ExcludeRules::none(),
        }
    }

    pub fn with_rules(mut self, rules: ExcludeRules) -> Self {
        self.rules = rules;
        self
    }

    fn excluded(&self, path: &Path) -> bool {
        self.rules.excludes(path, &self.root)
    }

    /// Apply one event as one committed transaction.
    ///
    /// - create: add the document, replacing any stored under the same key
    /// - modify: delete the document, then add it rebuilt from the same path
    /// - move: delete the source document, then add one built from the
    ///   destination
    /// - delete: delete the document
    pub fn apply(&self, event: &FsEvent) -> Result<EventOutcome> {
        if event.is_directory {
            debug!(%event, "Ignoring directory event");
            return Ok(EventOutcome::Ignored);
        }

        let path = event.path.as_path();
        let (remove, add) = match event.kind {
            // A create can race a startup scan that already indexed the file.
            FsEventKind::Created => (Some(path), Some(path)),
            FsEventKind::Modified => (Some(path), Some(path)),
            FsEventKind::Moved => {
                let dest = event.dest_path.as_deref().ok_or_else(|| ShelfError::InvalidEvent {
                    reason: format!("move of {} has no destination", path.display()),
                })?;
                (Some(path), Some(dest))
            }
            FsEventKind::Deleted => (Some(path), None),
        };

        let remove = remove.filter(|p| !self.excluded(p));
        let add = add.filter(|p| !self.excluded(p));
        if remove.is_none() && add.is_none() {
            debug!(%event, "Ignoring excluded path");
            return Ok(EventOutcome::Ignored);
        }

        // Classification can be slow; do it before taking the writer lock.
        let built = add.map(|p| build_fields(p, &self.classifier));

        let mut session = self.store.begin_write();
        if let Some(key) = remove.and_then(|p| p.to_str()) {
            session.delete_by_key(key);
        }

        let mut outcome = EventOutcome::Applied;
        match built {
            Some(Ok(document)) => session.add_document(document),
            Some(Err(e)) => {
                warn!(%event, error = %e, "Could not rebuild document");
                outcome = EventOutcome::Skipped;
            }
            None => {}
        }

        if session.pending() > 0 {
            session.commit()?;
        }

        debug!(%event, ?outcome, "Event applied");
        Ok(outcome)
    }
}

impl EventConsumer for IndexBridge {
    fn on_event(&self, event: FsEvent) {
        if let Err(e) = self.apply(&event) {
            warn!(%event, error = %e, "Failed to apply filesystem event");
        }
    }

    fn on_error(&self, error: String) {
        warn!(%error, "Watcher reported an error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExcludeConfig;
    use crate::schema::Schema;
    use crate::types::Document;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        store: Arc<IndexStore>,
        bridge: IndexBridge,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path().join("docs");
            fs::create_dir_all(&root).unwrap();
            let store = Arc::new(
                IndexStore::create(dir.path().join("index"), Schema::documents()).unwrap(),
            );
            let bridge = IndexBridge::new(
                Arc::clone(&store),
                Arc::new(Classifier::mime_only()),
                &root,
            );
            Fixture {
                _dir: dir,
                root,
                store,
                bridge,
            }
        }

        fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
            let path = self.root.join(name);
            fs::write(&path, contents).unwrap();
            path
        }

        fn docs(&self, path: &Path) -> Vec<Document> {
            self.store
                .snapshot()
                .by_key(path.to_str().unwrap())
                .cloned()
                .collect()
        }
    }

    #[test]
    fn test_create() {
        let fixture = Fixture::new();
        let path = fixture.write("notes.txt", b"hello\n");

        let outcome = fixture.bridge.apply(&FsEvent::created(&path, false)).unwrap();
        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(fixture.docs(&path).len(), 1);
        assert_eq!(fixture.store.stats().commit_id, 1);
    }

    #[test]
    fn test_repeated_create_keeps_one_document() {
        let fixture = Fixture::new();
        let path = fixture.write("notes.txt", b"hello\n");

        fixture.bridge.apply(&FsEvent::created(&path, false)).unwrap();
        fixture.bridge.apply(&FsEvent::created(&path, false)).unwrap();
        assert_eq!(fixture.docs(&path).len(), 1);
    }

    #[test]
    fn test_modify_rebuilds_document() {
        let fixture = Fixture::new();
        let path = fixture.write("notes.txt", b"hello\n");
        fixture.bridge.apply(&FsEvent::created(&path, false)).unwrap();

        fs::write(&path, vec![b'x'; 3000]).unwrap();
        fixture.bridge.apply(&FsEvent::modified(&path, false)).unwrap();

        let docs = fixture.docs(&path);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_size, 3);
    }

    #[test]
    fn test_move() {
        let fixture = Fixture::new();
        let from = fixture.write("draft.txt", b"draft\n");
        fixture.bridge.apply(&FsEvent::created(&from, false)).unwrap();

        let to = fixture.root.join("final.md");
        fs::rename(&from, &to).unwrap();
        fixture.bridge.apply(&FsEvent::moved(&from, &to, false)).unwrap();

        assert!(fixture.docs(&from).is_empty());
        let docs = fixture.docs(&to);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name_with_extension, "final.md");
        assert_eq!(docs[0].file_name, "final");
    }

    #[test]
    fn test_move_without_destination() {
        let fixture = Fixture::new();
        let event = FsEvent {
            dest_path: None,
            ..FsEvent::moved("/a", "/b", false)
        };
        let err = fixture.bridge.apply(&event).unwrap_err();
        assert!(matches!(err, ShelfError::InvalidEvent { .. }));
    }

    #[test]
    fn test_delete() {
        let fixture = Fixture::new();
        let path = fixture.write("notes.txt", b"hello\n");
        fixture.bridge.apply(&FsEvent::created(&path, false)).unwrap();

        fs::remove_file(&path).unwrap();
        let outcome = fixture.bridge.apply(&FsEvent::deleted(&path, false)).unwrap();
        assert_eq!(outcome, EventOutcome::Applied);
        assert!(fixture.store.is_empty());
    }

    #[test]
    fn test_directory_events_ignored() {
        let fixture = Fixture::new();
        let dir = fixture.root.join("sub");
        fs::create_dir(&dir).unwrap();

        let outcome = fixture.bridge.apply(&FsEvent::created(&dir, true)).unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
        assert_eq!(fixture.store.stats().commit_id, 0);
    }

    #[test]
    fn test_vanished_file_still_commits_delete() {
        let fixture = Fixture::new();
        let path = fixture.write("notes.txt", b"hello\n");
        fixture.bridge.apply(&FsEvent::created(&path, false)).unwrap();

        fs::remove_file(&path).unwrap();
        let outcome = fixture.bridge.apply(&FsEvent::modified(&path, false)).unwrap();
        assert_eq!(outcome, EventOutcome::Skipped);
        assert!(fixture.docs(&path).is_empty());
    }

    #[test]
    fn test_create_of_vanished_file_is_skipped() {
        let fixture = Fixture::new();
        let path = fixture.root.join("ghost.txt");
        let outcome = fixture.bridge.apply(&FsEvent::created(&path, false)).unwrap();
        assert_eq!(outcome, EventOutcome::Skipped);
        assert!(fixture.store.is_empty());
    }

    #[test]
    fn test_excluded_paths_ignored() {
        let mut fixture = Fixture::new();
        let rules = ExcludeRules::new(&ExcludeConfig {
            patterns: vec!["*.tmp".to_string()],
            ..Default::default()
        });
        fixture.bridge = IndexBridge::new(
            Arc::clone(&fixture.store),
            Arc::new(Classifier::mime_only()),
            &fixture.root,
        )
        .with_rules(rules);

        let tmp = fixture.write("save.tmp", b"partial");
        let outcome = fixture.bridge.apply(&FsEvent::created(&tmp, false)).unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);

        // Renaming a temp file into place indexes the destination
        let doc = fixture.root.join("save.txt");
        fs::rename(&tmp, &doc).unwrap();
        let outcome = fixture.bridge.apply(&FsEvent::moved(&tmp, &doc, false)).unwrap();
        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(fixture.docs(&doc).len(), 1);
    }

    #[test]
    fn test_events_in_order_per_path() {
        let fixture = Fixture::new();
        let path = fixture.write("a.txt", b"1");
        let events = vec![
            FsEvent::created(&path, false),
            FsEvent::modified(&path, false),
            FsEvent::modified(&path, false),
        ];
        for event in &events {
            fixture.bridge.on_event(event.clone());
        }
        assert_eq!(fixture.docs(&path).len(), 1);
        assert_eq!(fixture.store.stats().commit_id, 3);
    }

    #[test]
    fn test_channel_consumer() {
        let (consumer, receiver) = ChannelEventConsumer::new();
        consumer.on_event(FsEvent::deleted("/docs/a.txt", false));
        consumer.on_error("overflow".to_string());

        assert!(matches!(receiver.recv().unwrap(), EventMessage::Event(e) if e.kind == FsEventKind::Deleted));
        assert!(matches!(receiver.recv().unwrap(), EventMessage::Error(e) if e == "overflow"));
    }

    #[test]
    fn test_display() {
        let event = FsEvent::moved("/docs/a.txt", "/docs/b.txt", false);
        assert_eq!(event.to_string(), "moved /docs/a.txt -> /docs/b.txt");
    }
}
