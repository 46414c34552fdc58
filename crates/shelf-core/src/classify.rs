//! File type classification.
//!
//! A file's type label comes from one of two places, tried in order:
//!
//! 1. The platform's file-association registry. On Windows this is
//!    `HKLM\SOFTWARE\Classes`: the extension key's default value names a
//!    class, and the class key's default value is the display name
//!    (e.g. `.pdf` -> `AcroExch.Document.DC` -> `Adobe Acrobat Document`).
//! 2. A MIME type sniffed from the file's contents (see [`crate::mime`]).
//!
//! Registry failures are expected (unknown extension, no registry on this
//! platform) and never leave this module. Only a failed sniff surfaces, as a
//! per-file indexing error.

use crate::error::{Result, ShelfError};
use crate::mime;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Why a registry lookup produced no label.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// This platform has no association registry
    #[error("no file association registry on this platform")]
    Unsupported,

    /// The file name has no extension to look up
    #[error("file has no extension")]
    NoExtension,

    /// A registry key in the lookup chain does not exist
    #[error("registry key not found: {key}")]
    MissingKey { key: String },

    /// A key exists but its default value is empty
    #[error("registry key has no default value: {key}")]
    EmptyValue { key: String },

    /// The registry could not be read
    #[error("registry access failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A source of extension -> display name associations.
pub trait AssociationRegistry: Send + Sync {
    /// Resolve an extension (including the leading dot, e.g. `".pdf"`) to a
    /// human-readable application or type name.
    fn display_name(&self, extension: &str) -> std::result::Result<String, RegistryError>;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// Registry used where the platform has none; every lookup reports
/// [`RegistryError::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRegistry;

impl AssociationRegistry for NoRegistry {
    fn display_name(&self, _extension: &str) -> std::result::Result<String, RegistryError> {
        Err(RegistryError::Unsupported)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(windows)]
pub use windows_registry::WindowsRegistry;

#[cfg(windows)]
mod windows_registry {
    use super::{AssociationRegistry, RegistryError};
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    const CLASSES: &str = r"SOFTWARE\Classes";

    /// Lookups against `HKLM\SOFTWARE\Classes`.
    pub struct WindowsRegistry {
        hklm: RegKey,
    }

    impl WindowsRegistry {
        pub fn new() -> Self {
            WindowsRegistry {
                hklm: RegKey::predef(HKEY_LOCAL_MACHINE),
            }
        }

        fn default_value(&self, class: &str) -> Result<String, RegistryError> {
            let key = format!(r"{}\{}", CLASSES, class);
            let subkey = self.hklm.open_subkey(&key).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RegistryError::MissingKey { key: key.clone() }
                } else {
                    RegistryError::Io(e)
                }
            })?;
            let value: String = subkey.get_value("")?;
            if value.is_empty() {
                return Err(RegistryError::EmptyValue { key });
            }
            Ok(value)
        }
    }

    impl Default for WindowsRegistry {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AssociationRegistry for WindowsRegistry {
        fn display_name(&self, extension: &str) -> Result<String, RegistryError> {
            let class = self.default_value(extension)?;
            self.default_value(&class)
        }

        fn name(&self) -> &'static str {
            "windows"
        }
    }
}

/// Where a type label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSource {
    Registry,
    Mime,
}

impl fmt::Display for TypeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSource::Registry => write!(f, "registry"),
            TypeSource::Mime => write!(f, "mime"),
        }
    }
}

/// The result of classifying a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileType {
    pub label: String,
    pub source: TypeSource,
}

/// Resolves files to type labels.
pub struct Classifier {
    registry: Box<dyn AssociationRegistry>,
}

impl Classifier {
    /// Create a classifier using the platform's registry, if it has one.
    pub fn new() -> Self {
        #[cfg(windows)]
        let registry: Box<dyn AssociationRegistry> = Box::new(WindowsRegistry::new());
        #[cfg(not(windows))]
        let registry: Box<dyn AssociationRegistry> = Box::new(NoRegistry);

        Classifier { registry }
    }

    /// Create a classifier that always sniffs contents.
    pub fn mime_only() -> Self {
        Classifier {
            registry: Box::new(NoRegistry),
        }
    }

    /// Create a classifier with a custom registry.
    pub fn with_registry(registry: Box<dyn AssociationRegistry>) -> Self {
        Classifier { registry }
    }

    /// Classify the file at `path`.
    pub fn classify(&self, path: &Path) -> Result<FileType> {
        match self.lookup(path) {
            Ok(label) => Ok(FileType {
                label,
                source: TypeSource::Registry,
            }),
            Err(reason) => {
                debug!(
                    path = %path.display(),
                    registry = self.registry.name(),
                    %reason,
                    "Registry lookup failed, sniffing MIME type"
                );
                let label = mime::sniff_file(path).map_err(|e| {
                    ShelfError::indexing(path, format!("MIME sniff failed: {}", e))
                })?;
                Ok(FileType {
                    label: label.to_string(),
                    source: TypeSource::Mime,
                })
            }
        }
    }

    fn lookup(&self, path: &Path) -> std::result::Result<String, RegistryError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or(RegistryError::NoExtension)?;
        self.registry.display_name(&format!(".{}", extension))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("registry", &self.registry.name())
            .finish()
    }
}
