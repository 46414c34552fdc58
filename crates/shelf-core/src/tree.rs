//! Directory tree snapshots for category browsing.
//!
//! A tree is built from scratch on every request and owned by the caller;
//! nothing is cached between builds.

use crate::config::ExcludeRules;
use crate::error::{Result, ShelfError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Maps every directory under a root to the names of its immediate
/// subdirectories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryTree {
    root: PathBuf,
    children: BTreeMap<PathBuf, BTreeSet<String>>,
}

impl DirectoryTree {
    /// Walk `root` and record its directory structure.
    pub fn build(root: &Path, rules: &ExcludeRules) -> Result<Self> {
        if !root.is_dir() {
            return Err(ShelfError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("watched root {} is not a directory", root.display()),
            )));
        }

        let mut children: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.file_type().is_dir()
                    && (e.depth() == 0
                        || !(rules.excludes_name(&e.file_name().to_string_lossy())
                            || rules.excludes_path(&e.path().to_string_lossy())))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            children.entry(entry.path().to_path_buf()).or_default();
            if entry.depth() > 0 {
                if let Some(parent) = entry.path().parent() {
                    children
                        .entry(parent.to_path_buf())
                        .or_default()
                        .insert(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }

        debug!(root = %root.display(), directories = children.len(), "Directory tree built");
        Ok(DirectoryTree {
            root: root.to_path_buf(),
            children,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the immediate subdirectories of `dir`, if it is in the tree.
    pub fn children(&self, dir: &Path) -> Option<&BTreeSet<String>> {
        self.children.get(dir)
    }

    /// Every directory with its subdirectory names, in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &BTreeSet<String>)> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<PathBuf, BTreeSet<String>> {
        self.children
    }
}
