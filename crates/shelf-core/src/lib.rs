//! # Shelf Core Library
//!
//! This crate provides the indexing, reconciliation and search functionality
//! for Shelf, a document-directory indexer. It indexes file names, paths and
//! metadata (never contents) under one watched root and keeps the index in
//! step with the filesystem.
//!
//! ## Architecture
//!
//! - **Types** (`types`, `schema`): The document record and its fields
//! - **Classify** (`classify`, `mime`): File type labels from the platform
//!   registry, falling back to content sniffing
//! - **Store** (`store`, `persistence`): Persistent index with atomic,
//!   serialized write sessions and snapshot reads
//! - **Reconcile** (`reconcile`): Startup bulk index or incremental catch-up
//! - **Query** (`query`): Filename and path search
//! - **Events** (`events`): Filesystem events applied as index mutations
//! - **Collection** (`collection`): The surface used by front ends
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use shelf_core::{Collection, CollectionOptions};
//!
//! let (collection, report) =
//!     Collection::initialize("/var/lib/shelf", "/home/ana/Documents", CollectionOptions::default())?;
//! println!("{}", report);
//!
//! for doc in collection.search("/home/ana/Documents", "invoice", false)? {
//!     println!("{}", doc.path_with_file_name);
//! }
//! ```

pub mod classify;
pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod mime;
pub mod persistence;
pub mod query;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use classify::{AssociationRegistry, Classifier, FileType, TypeSource};
pub use collection::{Collection, CollectionOptions, StartupHandle};
pub use config::{absolute_path, Config, ExcludeRules};
pub use error::{Result, ShelfError};
pub use events::{
    ChannelEventConsumer, EventConsumer, EventMessage, EventOutcome, FsEvent, FsEventKind,
    IndexBridge,
};
pub use query::{Query, QueryEngine, QueryIntent};
pub use reconcile::{ReconcileMode, ReconcileReport, Reconciler};
pub use schema::{build_fields, Field, Schema};
pub use store::{IndexStore, Limit, SearchHit, WriteSession};
pub use tree::DirectoryTree;
pub use types::{Document, IndexStats};
