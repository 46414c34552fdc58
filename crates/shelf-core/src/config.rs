//! Configuration management for Shelf.
//!
//! This module provides configuration loading, saving, and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.

use crate::error::{Result, ShelfError};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for Shelf.
///
/// ## Example Configuration File (shelf.toml)
///
/// ```toml
/// [general]
/// watched_root = "/home/ana/Documents"
/// log_level = "info"
///
/// [exclude]
/// paths = ["/home/ana/Documents/scratch"]
/// patterns = ["*.tmp", "~$*"]
/// hidden = true
///
/// [performance]
/// parallel_threshold = 2000
/// compress_index = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Path and pattern exclusions
    pub exclude: ExcludeConfig,

    /// Performance tuning
    pub performance: PerformanceConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Index directory (None = platform data directory)
    pub index_path: Option<PathBuf>,

    /// Directory tree to index (None = the user's document directory)
    pub watched_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            index_path: None,
            watched_root: None,
            log_level: "info".to_string(),
        }
    }
}

/// Exclusion configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExcludeConfig {
    /// Directories to exclude, with everything beneath them
    pub paths: Vec<String>,

    /// Name patterns to exclude (`*` prefix, suffix or both)
    pub patterns: Vec<String>,

    /// Exclude dot-files and dot-directories
    pub hidden: bool,
}

/// Performance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// File count above which documents are built on the thread pool
    pub parallel_threshold: usize,

    /// Use compression for index storage
    pub compress_index: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            parallel_threshold: 1000,
            compress_index: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| ShelfError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self).map_err(|e| ShelfError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, contents)?;
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "shelf").ok_or_else(|| ShelfError::ConfigError {
            reason: "Could not determine application directories".to_string(),
        })
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("shelf.toml"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Get the index directory (from config or default).
    pub fn index_dir(&self) -> Result<PathBuf> {
        match self.general.index_path {
            Some(ref path) => Ok(path.clone()),
            None => Self::default_data_dir(),
        }
    }

    /// Get the watched root (from config, else the document directory, else
    /// the home directory).
    pub fn watched_root(&self) -> Result<PathBuf> {
        if let Some(ref root) = self.general.watched_root {
            return absolute_path(root);
        }

        let dirs = UserDirs::new().ok_or_else(|| ShelfError::ConfigError {
            reason: "Could not determine home directory".to_string(),
        })?;
        Ok(dirs
            .document_dir()
            .unwrap_or_else(|| dirs.home_dir())
            .to_path_buf())
    }

    /// The compiled exclusion rules.
    pub fn exclude_rules(&self) -> ExcludeRules {
        ExcludeRules::new(&self.exclude)
    }
}

/// Make `path` absolute against the current directory.
///
/// Symlinks are not resolved, so the result keeps the spelling a watcher
/// started on it reports. `.` components are dropped and `..` components
/// are folded lexically.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut absolute = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                absolute.pop();
            }
            other => absolute.push(other),
        }
    }
    Ok(absolute)
}

/// Compiled exclusions, shared by the scanner, the tree builder and the
/// event bridge.
#[derive(Debug, Clone, Default)]
pub struct ExcludeRules {
    paths: Vec<String>,
    patterns: Vec<String>,
    hidden: bool,
}

impl ExcludeRules {
    pub fn new(config: &ExcludeConfig) -> Self {
        ExcludeRules {
            paths: config.paths.iter().map(|p| p.to_lowercase()).collect(),
            patterns: config.patterns.iter().map(|p| p.to_lowercase()).collect(),
            hidden: config.hidden,
        }
    }

    /// Rules that exclude nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.patterns.is_empty() && !self.hidden
    }

    /// Check if a single file or directory name should be excluded.
    pub fn excludes_name(&self, name: &str) -> bool {
        if self.hidden && name.starts_with('.') {
            return true;
        }
        self.patterns
            .iter()
            .any(|pattern| matches_simple_pattern(name, pattern))
    }

    /// Check if a path should be excluded by the path list.
    pub fn excludes_path(&self, path: &str) -> bool {
        let path_lower = path.to_lowercase();
        self.paths.iter().any(|excluded| {
            path_lower
                .strip_prefix(excluded.as_str())
                .map_or(false, |rest| {
                    rest.is_empty()
                        || rest.starts_with(std::path::is_separator)
                        || excluded.ends_with(std::path::is_separator)
                })
        })
    }

    /// Check an entry by its full path: the path list, then every name
    /// between `root` and the entry.
    pub fn excludes(&self, path: &Path, root: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.excludes_path(&path.to_string_lossy()) {
            return true;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        relative.components().any(|component| match component {
            Component::Normal(name) => self.excludes_name(&name.to_string_lossy()),
            _ => false,
        })
    }
}

/// Simple pattern matching for exclusion patterns.
///
/// Supports:
/// - `*` at start or end (e.g., `*.tmp`, `~*`)
/// - Exact match otherwise
///
/// `pattern` must already be lowercase.
fn matches_simple_pattern(name: &str, pattern: &str) -> bool {
    let name_lower = name.to_lowercase();

    if pattern.starts_with('*') && pattern.ends_with('*') && pattern.len() > 2 {
        // Contains pattern
        let middle = &pattern[1..pattern.len() - 1];
        name_lower.contains(middle)
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        // Ends with pattern
        name_lower.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        // Starts with pattern
        name_lower.starts_with(prefix)
    } else {
        // Exact match
        name_lower == pattern
    }
}
