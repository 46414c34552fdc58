//! # Shelf Watcher
//!
//! This crate produces filesystem events for Shelf. It wraps the `notify`
//! crate's recommended native watcher (inotify, FSEvents,
//! ReadDirectoryChangesW) and translates its notifications into
//! `shelf_core::FsEvent`s delivered to any `EventConsumer`.
//!
//! The core never depends on this crate; front ends wire the two together:
//!
//! ```rust,ignore
//! let handle = NotifyWatcher::start(collection.watched_root(), collection.bridge())?;
//! // events flow until `handle` is dropped
//! ```

mod watcher;

/// Error types specific to the watcher
pub mod error;
pub use error::WatchError;

pub use watcher::{translate, NotifyWatcher, Translator, WatchHandle};
