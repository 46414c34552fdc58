//! A native watcher that feeds an `EventConsumer`.

use crate::error::WatchError;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use shelf_core::{EventConsumer, FsEvent};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Number of rename trackers remembered while waiting for the combined
/// rename notification.
const TRACKER_MEMORY: usize = 256;

/// Translate one native notification into zero or more events.
///
/// Directory flags come from the native kind when it says, otherwise from
/// probing the path (which only works while it still exists).
pub fn translate(event: &Event) -> Vec<FsEvent> {
    let paths = &event.paths;
    match event.kind {
        EventKind::Create(kind) => paths
            .iter()
            .map(|p| {
                let is_dir = match kind {
                    CreateKind::Folder => true,
                    CreateKind::File => false,
                    _ => p.is_dir(),
                };
                FsEvent::created(p, is_dir)
            })
            .collect(),

        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, paths.as_slice()) {
            (RenameMode::Both, [from, to]) => vec![FsEvent::moved(from, to, to.is_dir())],
            (RenameMode::From, _) => paths.iter().map(|p| FsEvent::deleted(p, false)).collect(),
            (RenameMode::To, _) => paths
                .iter()
                .map(|p| FsEvent::created(p, p.is_dir()))
                .collect(),
            _ => paths
                .iter()
                .map(|p| {
                    if p.exists() {
                        FsEvent::created(p, p.is_dir())
                    } else {
                        FsEvent::deleted(p, false)
                    }
                })
                .collect(),
        },

        EventKind::Modify(_) => paths
            .iter()
            .map(|p| FsEvent::modified(p, p.is_dir()))
            .collect(),

        EventKind::Remove(kind) => paths
            .iter()
            .map(|p| FsEvent::deleted(p, kind == RemoveKind::Folder))
            .collect(),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Stateful translation for backends that report a rename three times
/// (from, to, then both paths together).
///
/// The from and to halves are translated as they arrive, so a file moved
/// out of or into the watched tree is still handled. When the combined
/// notification follows with the same tracker, only the halves not already
/// delivered are emitted.
#[derive(Debug, Default)]
pub struct Translator {
    from_seen: VecDeque<usize>,
    to_seen: VecDeque<usize>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, event: &Event) -> Vec<FsEvent> {
        let tracker = event.attrs.tracker();
        match (event.kind, tracker) {
            (EventKind::Modify(ModifyKind::Name(RenameMode::From)), Some(t)) => {
                remember(&mut self.from_seen, t);
                translate(event)
            }
            (EventKind::Modify(ModifyKind::Name(RenameMode::To)), Some(t)) => {
                remember(&mut self.to_seen, t);
                translate(event)
            }
            (EventKind::Modify(ModifyKind::Name(RenameMode::Both)), Some(t)) => {
                let from_done = forget(&mut self.from_seen, t);
                let to_done = forget(&mut self.to_seen, t);
                match (from_done, to_done, event.paths.as_slice()) {
                    (true, true, _) => Vec::new(),
                    (true, false, [_, to]) => vec![FsEvent::created(to, to.is_dir())],
                    (false, true, [from, _]) => vec![FsEvent::deleted(from, false)],
                    _ => translate(event),
                }
            }
            _ => translate(event),
        }
    }
}

fn remember(seen: &mut VecDeque<usize>, tracker: usize) {
    if seen.len() == TRACKER_MEMORY {
        seen.pop_front();
    }
    seen.push_back(tracker);
}

fn forget(seen: &mut VecDeque<usize>, tracker: usize) -> bool {
    match seen.iter().position(|&t| t == tracker) {
        Some(index) => {
            seen.remove(index);
            true
        }
        None => false,
    }
}

/// A running watcher. Dropping it stops event delivery.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl WatchHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching.
    pub fn stop(self) {
        info!(root = %self.root.display(), "Watcher stopped");
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("root", &self.root).finish()
    }
}

/// Watches a directory tree with the platform's native backend.
pub struct NotifyWatcher;

impl NotifyWatcher {
    /// Start watching `root` recursively, delivering events to `consumer`
    /// from the backend's notification thread.
    pub fn start(root: &Path, consumer: Arc<dyn EventConsumer>) -> Result<WatchHandle, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::RootNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut translator = Translator::new();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    trace!(?event, "Native notification");
                    for fs_event in translator.translate(&event) {
                        debug!(event = %fs_event, "Delivering filesystem event");
                        consumer.on_event(fs_event);
                    }
                }
                Err(e) => consumer.on_error(e.to_string()),
            },
            notify::Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        info!(root = %root.display(), "Watcher started");
        Ok(WatchHandle {
            _watcher: watcher,
            root: root.to_path_buf(),
        })
    }
}
