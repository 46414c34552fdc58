//! The document collection: one index store bound to one watched root.
//!
//! This is the surface presentation layers use. A collection is opened
//! synchronously, so fatal store errors surface before anything else runs.
//! The startup pass (bulk index or reconcile) can then run inline or on a
//! background worker while searches are served from the last commit.

use crate::classify::Classifier;
use crate::config::{absolute_path, Config, ExcludeRules};
use crate::error::{Result, ShelfError};
use crate::events::{EventOutcome, FsEvent, IndexBridge};
use crate::query::QueryEngine;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::schema::Schema;
use crate::store::IndexStore;
use crate::tree::DirectoryTree;
use crate::types::{Document, IndexStats};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Knobs for opening a collection.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub rules: ExcludeRules,
    pub parallel_threshold: usize,
    pub compress: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        CollectionOptions {
            rules: ExcludeRules::none(),
            parallel_threshold: 1000,
            compress: true,
        }
    }
}

impl CollectionOptions {
    pub fn from_config(config: &Config) -> Self {
        CollectionOptions {
            rules: config.exclude_rules(),
            parallel_threshold: config.performance.parallel_threshold,
            compress: config.performance.compress_index,
        }
    }
}

/// An index store bound to a watched root.
pub struct Collection {
    store: Arc<IndexStore>,
    classifier: Arc<Classifier>,
    bridge: Arc<IndexBridge>,
    root: PathBuf,
    rules: ExcludeRules,
    parallel_threshold: usize,
    /// Set until the first startup pass runs on a newly created store
    fresh: AtomicBool,
}

impl Collection {
    /// Open the index at `index_location`, creating it if absent.
    ///
    /// A relative `watched_root` is resolved against the current directory.
    pub fn open(
        index_location: impl AsRef<Path>,
        watched_root: impl AsRef<Path>,
        options: CollectionOptions,
    ) -> Result<Self> {
        Self::open_with_classifier(index_location, watched_root, options, Classifier::new())
    }

    /// Like [`Collection::open`], with a custom classifier.
    pub fn open_with_classifier(
        index_location: impl AsRef<Path>,
        watched_root: impl AsRef<Path>,
        options: CollectionOptions,
        classifier: Classifier,
    ) -> Result<Self> {
        let index_location = index_location.as_ref();
        // Keys are absolute paths, matching what watchers report.
        let root = absolute_path(watched_root.as_ref())?;

        let fresh = !IndexStore::exists(index_location);
        let store = if fresh {
            IndexStore::create(index_location, Schema::documents())?
        } else {
            let store = IndexStore::open(index_location)?;
            if store.schema() != &Schema::documents() {
                return Err(ShelfError::SchemaMismatch {
                    reason: format!(
                        "index at {} was written with a different field set",
                        index_location.display()
                    ),
                });
            }
            store
        };
        let store = Arc::new(store.with_compression(options.compress));
        let classifier = Arc::new(classifier);

        let bridge = Arc::new(
            IndexBridge::new(Arc::clone(&store), Arc::clone(&classifier), &root)
                .with_rules(options.rules.clone()),
        );

        info!(
            index = %index_location.display(),
            root = %root.display(),
            fresh,
            documents = store.len(),
            "Collection opened"
        );

        Ok(Collection {
            store,
            classifier,
            bridge,
            root,
            rules: options.rules,
            parallel_threshold: options.parallel_threshold,
            fresh: AtomicBool::new(fresh),
        })
    }

    /// Open the collection and run the startup pass to completion.
    pub fn initialize(
        index_location: impl AsRef<Path>,
        watched_root: impl AsRef<Path>,
        options: CollectionOptions,
    ) -> Result<(Self, ReconcileReport)> {
        let collection = Self::open(index_location, watched_root, options)?;
        let report = collection.run_startup()?;
        Ok((collection, report))
    }

    /// True until the first startup pass on a newly created store.
    pub fn is_fresh(&self) -> bool {
        self.fresh.load(Ordering::SeqCst)
    }

    /// Run the startup pass on the calling thread.
    pub fn run_startup(&self) -> Result<ReconcileReport> {
        let fresh = self.fresh.swap(false, Ordering::SeqCst);
        Reconciler::new(&self.store, &self.classifier, &self.root, &self.rules)
            .with_parallel_threshold(self.parallel_threshold)
            .run(fresh)
    }

    /// Run the startup pass on a background thread.
    pub fn spawn_startup(&self) -> Result<StartupHandle> {
        let fresh = self.fresh.swap(false, Ordering::SeqCst);
        let store = Arc::clone(&self.store);
        let classifier = Arc::clone(&self.classifier);
        let root = self.root.clone();
        let rules = self.rules.clone();
        let threshold = self.parallel_threshold;

        let (sender, receiver) = bounded(1);
        let thread = thread::Builder::new()
            .name("shelf-startup".to_string())
            .spawn(move || {
                let result = Reconciler::new(&store, &classifier, &root, &rules)
                    .with_parallel_threshold(threshold)
                    .run(fresh);
                if let Err(ref e) = result {
                    error!(error = %e, "Startup pass failed");
                }
                let _ = sender.send(result);
            })?;

        Ok(StartupHandle {
            receiver,
            thread: Some(thread),
            result: None,
        })
    }

    /// Search documents under `root` whose file name contains `file_name`.
    pub fn search(&self, root: &str, file_name: &str, exact_path: bool) -> Result<Vec<Document>> {
        QueryEngine::new(&self.store, &self.root).search(root, file_name, exact_path)
    }

    /// A fresh snapshot of the watched root's directory structure.
    pub fn directory_tree(&self) -> Result<DirectoryTree> {
        DirectoryTree::build(&self.root, &self.rules)
    }

    /// Apply one filesystem event to the index.
    pub fn on_filesystem_event(&self, event: &FsEvent) -> Result<EventOutcome> {
        self.bridge.apply(event)
    }

    /// The event consumer to hand to a watcher.
    pub fn bridge(&self) -> Arc<IndexBridge> {
        Arc::clone(&self.bridge)
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn watched_root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> IndexStats {
        self.store.stats()
    }
}

/// A startup pass running in the background.
pub struct StartupHandle {
    receiver: Receiver<Result<ReconcileReport>>,
    thread: Option<JoinHandle<()>>,
    result: Option<Result<ReconcileReport>>,
}

impl StartupHandle {
    /// Check without blocking whether the pass has finished.
    pub fn try_finished(&mut self) -> bool {
        if self.result.is_some() {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.result = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.result = Some(Err(worker_lost()));
                true
            }
        }
    }

    /// Block until the pass finishes and return its report.
    pub fn wait(mut self) -> Result<ReconcileReport> {
        let result = match self.result.take() {
            Some(result) => result,
            None => self.receiver.recv().unwrap_or_else(|_| Err(worker_lost())),
        };
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                return Err(worker_lost());
            }
        }
        result
    }
}

fn worker_lost() -> ShelfError {
    ShelfError::Internal("startup worker exited without a report".to_string())
}
