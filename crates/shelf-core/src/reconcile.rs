//! Startup indexing: bulk index a fresh store, or reconcile an existing one
//! against the live filesystem.
//!
//! Both paths enumerate the watched root with [`scan_files`], derive
//! documents through [`build_fields`], stage everything in a single write
//! session and commit once. Files that cannot be indexed are logged,
//! counted and skipped; they never abort the pass.

use crate::classify::Classifier;
use crate::config::ExcludeRules;
use crate::error::{Result, ShelfError};
use crate::schema::{build_fields, modified_at};
use crate::store::IndexStore;
use crate::types::Document;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// A regular file found on disk.
#[derive(Debug, Clone)]
pub struct LiveFile {
    pub path: PathBuf,
    pub key: String,
    /// `None` if the timestamp could not be read
    pub modified: Option<DateTime<Utc>>,
}

/// The result of enumerating the watched root.
#[derive(Debug, Default)]
pub struct LiveSet {
    pub files: Vec<LiveFile>,
    /// Entries that could not be read or keyed
    pub skipped: usize,
}

/// Enumerate every regular file beneath `root`, honoring exclusions.
///
/// Fails only if `root` itself is not a readable directory.
pub fn scan_files(root: &Path, rules: &ExcludeRules) -> Result<LiveSet> {
    if !root.is_dir() {
        return Err(ShelfError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("watched root {} is not a directory", root.display()),
        )));
    }

    let mut live = LiveSet::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(rules.excludes_name(&e.file_name().to_string_lossy())
                    || rules.excludes_path(&e.path().to_string_lossy()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                live.skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let Some(key) = path.to_str().map(str::to_string) else {
            warn!(path = %path.display(), "Skipping non UTF-8 path");
            live.skipped += 1;
            continue;
        };
        let modified = path.metadata().and_then(|m| modified_at(&m)).ok();

        live.files.push(LiveFile {
            path,
            key,
            modified,
        });
    }

    debug!(
        root = %root.display(),
        files = live.files.len(),
        skipped = live.skipped,
        "Scan complete"
    );
    Ok(live)
}

/// Which startup path ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    Bulk,
    Incremental,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileMode::Bulk => write!(f, "bulk"),
            ReconcileMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// What a startup pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub mode: ReconcileMode,
    /// Files found on disk
    pub scanned: usize,
    /// Documents for files not previously indexed
    pub added: usize,
    /// Documents whose file no longer exists
    pub removed: usize,
    /// Documents rebuilt because their file changed
    pub reindexed: usize,
    /// Documents left as they were
    pub unchanged: usize,
    /// Files that could not be indexed
    pub skipped: usize,
}

impl ReconcileReport {
    fn new(mode: ReconcileMode) -> Self {
        ReconcileReport {
            mode,
            scanned: 0,
            added: 0,
            removed: 0,
            reindexed: 0,
            unchanged: 0,
            skipped: 0,
        }
    }

    /// True if the pass changed nothing in the index.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.reindexed == 0
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pass: {} scanned, {} added, {} removed, {} reindexed, {} unchanged, {} skipped",
            self.mode,
            self.scanned,
            self.added,
            self.removed,
            self.reindexed,
            self.unchanged,
            self.skipped
        )
    }
}

/// Runs the startup pass for one store and watched root.
pub struct Reconciler<'a> {
    store: &'a IndexStore,
    classifier: &'a Classifier,
    root: &'a Path,
    rules: &'a ExcludeRules,
    parallel_threshold: usize,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a IndexStore,
        classifier: &'a Classifier,
        root: &'a Path,
        rules: &'a ExcludeRules,
    ) -> Self {
        Reconciler {
            store,
            classifier,
            root,
            rules,
            parallel_threshold: 1000,
        }
    }

    /// Build documents on the thread pool when more than `threshold` files
    /// need indexing.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Bulk index if the store was just created, otherwise reconcile.
    pub fn run(&self, fresh: bool) -> Result<ReconcileReport> {
        if fresh {
            self.bulk_index()
        } else {
            self.reconcile()
        }
    }

    /// Index every file under the root into the store.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn bulk_index(&self) -> Result<ReconcileReport> {
        let start = Instant::now();
        let mut report = ReconcileReport::new(ReconcileMode::Bulk);

        let live = scan_files(self.root, self.rules)?;
        report.scanned = live.files.len();
        report.skipped = live.skipped;

        let pending: Vec<&LiveFile> = live.files.iter().collect();
        let (documents, failed) = self.build_documents(&pending);
        report.skipped += failed;
        report.added = documents.len();

        let mut session = self.store.begin_write();
        for document in documents {
            session.add_document(document);
        }
        session.commit()?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            added = report.added,
            skipped = report.skipped,
            "Bulk index complete"
        );
        Ok(report)
    }

    /// Bring the store in line with the files on disk, rebuilding only
    /// documents that are new or changed.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let start = Instant::now();
        let mut report = ReconcileReport::new(ReconcileMode::Incremental);

        let live = scan_files(self.root, self.rules)?;
        report.scanned = live.files.len();
        report.skipped = live.skipped;
        let by_key: HashMap<&str, &LiveFile> =
            live.files.iter().map(|f| (f.key.as_str(), f)).collect();

        let mut session = self.store.begin_write();
        let stored = self.store.read_all();

        let mut seen: HashSet<&str> = HashSet::with_capacity(stored.len());
        let mut stale: HashSet<&str> = HashSet::new();
        for document in stored.iter() {
            let key = document.key();
            if !seen.insert(key) {
                continue;
            }
            match by_key.get(key) {
                None => {
                    session.delete_by_key(key);
                    report.removed += 1;
                }
                Some(file) => match file.modified {
                    Some(modified) if modified > document.last_modified => {
                        session.delete_by_key(key);
                        stale.insert(key);
                    }
                    _ => report.unchanged += 1,
                },
            }
        }

        let pending: Vec<&LiveFile> = live
            .files
            .iter()
            .filter(|f| stale.contains(f.key.as_str()) || !seen.contains(f.key.as_str()))
            .collect();
        let (documents, failed) = self.build_documents(&pending);
        report.skipped += failed;

        for document in documents {
            if stale.contains(document.key()) {
                report.reindexed += 1;
            } else {
                report.added += 1;
            }
            session.add_document(document);
        }
        session.commit()?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            added = report.added,
            removed = report.removed,
            reindexed = report.reindexed,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "Reconciliation complete"
        );
        Ok(report)
    }

    /// Derive documents for `files`, returning them with the failure count.
    fn build_documents(&self, files: &[&LiveFile]) -> (Vec<Document>, usize) {
        let build = |file: &&LiveFile| match build_fields(&file.path, self.classifier) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(error = %e, "Skipping file");
                None
            }
        };

        let documents: Vec<Document> = if files.len() > self.parallel_threshold {
            files.par_iter().filter_map(build).collect()
        } else {
            files.iter().filter_map(build).collect()
        };
        let failed = files.len() - documents.len();
        (documents, failed)
    }
}
