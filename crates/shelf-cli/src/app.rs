//! Application state management.

use shelf_core::{Collection, CollectionOptions, Config, IndexStore};
use std::path::PathBuf;
use tracing::info;

/// Resolved locations for one invocation.
pub struct App {
    /// Configuration
    pub config: Config,

    /// Where the index files live
    pub index_dir: PathBuf,

    /// The watched document directory
    pub root: PathBuf,
}

impl App {
    /// Resolve the index and root locations from the configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let index_dir = config.index_dir()?;
        let root = config.watched_root()?;

        Ok(App {
            config,
            index_dir,
            root,
        })
    }

    /// Whether an index has been created at the index location.
    pub fn index_exists(&self) -> bool {
        IndexStore::exists(&self.index_dir)
    }

    /// Open the collection, creating an empty index if none exists.
    pub fn open_collection(&self) -> anyhow::Result<Collection> {
        let options = CollectionOptions::from_config(&self.config);
        let collection = Collection::open(&self.index_dir, &self.root, options)?;

        info!(
            index_dir = %self.index_dir.display(),
            root = %self.root.display(),
            documents = collection.stats().documents,
            "Application initialized"
        );

        Ok(collection)
    }

    /// Open the existing index without creating one.
    pub fn open_store(&self) -> anyhow::Result<IndexStore> {
        Ok(IndexStore::open(&self.index_dir)?)
    }
}
