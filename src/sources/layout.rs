//! Reader for symlink-swapped configuration directories.
//!
//! Orchestrators such as Kubernetes publish a ConfigMap volume as:
//!
//! ```text
//! mount/
//! ├── ..2024_05_01_10_00_00.123456789/   immutable, one file per key
//! │   ├── some_dynint
//! │   └── some_int
//! ├── ..data -> ..2024_05_01_10_00_00.123456789
//! ├── some_dynint -> ..data/some_dynint
//! └── some_int -> ..data/some_int
//! ```
//!
//! An update writes a new timestamped directory and atomically repoints
//! `..data` at it, so the directory behind `..data` is always complete.

use crate::error::{FlagError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the indirection entry used by Kubernetes volume mounts.
pub const DEFAULT_DATA_LINK: &str = "..data";

/// A key file inside the resolved configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutFile {
    /// File name, which is also the flag name
    pub name: String,
    /// Full path to the file
    pub path: PathBuf,
}

impl LayoutFile {
    /// Read the file's raw contents.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Io`] if the file cannot be read as UTF-8 text.
    pub fn read_value(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| FlagError::io(&self.path, e))
    }
}

/// The directory currently published behind the indirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Canonical path the indirection points at
    pub resolved_dir: PathBuf,
    /// Key files in the directory, sorted by name
    pub files: Vec<LayoutFile>,
}

/// Resolves the indirection under a mount path and lists the key files behind it.
///
/// # Examples
///
/// ```rust,no_run
/// use dynflag::sources::DirectoryLayoutReader;
///
/// # fn main() -> dynflag::error::Result<()> {
/// let reader = DirectoryLayoutReader::new("/etc/config");
/// let layout = reader.read()?;
/// for file in &layout.files {
///     println!("{} = {}", file.name, file.read_value()?.trim());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryLayoutReader {
    mount_path: PathBuf,
    data_link: String,
}

impl DirectoryLayoutReader {
    /// Create a reader for `mount_path` using the `..data` indirection.
    pub fn new(mount_path: impl Into<PathBuf>) -> Self {
        Self {
            mount_path: mount_path.into(),
            data_link: DEFAULT_DATA_LINK.to_string(),
        }
    }

    /// Use a different indirection entry name.
    pub fn with_data_link(mut self, name: impl Into<String>) -> Self {
        self.data_link = name.into();
        self
    }

    /// The configured mount path.
    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// The indirection entry name.
    pub fn data_link(&self) -> &str {
        &self.data_link
    }

    /// Resolve the indirection to the canonical directory it points at.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Layout`] if the indirection is missing, is not a
    /// symlink, or does not lead to an existing directory.
    pub fn resolve(&self) -> Result<PathBuf> {
        let link = self.mount_path.join(&self.data_link);

        let metadata = fs::symlink_metadata(&link)
            .map_err(|e| FlagError::layout(&link, format!("indirection is missing: {}", e)))?;
        if !metadata.file_type().is_symlink() {
            return Err(FlagError::layout(&link, "indirection is not a symlink"));
        }

        let target = fs::read_link(&link)
            .map_err(|e| FlagError::layout(&link, format!("unreadable indirection: {}", e)))?;
        // Relative targets are relative to the directory holding the link.
        let target = if target.is_relative() {
            self.mount_path.join(target)
        } else {
            target
        };

        let resolved = target.canonicalize().map_err(|e| {
            FlagError::layout(
                &link,
                format!("target {} does not resolve: {}", target.display(), e),
            )
        })?;
        if !resolved.is_dir() {
            return Err(FlagError::layout(
                &link,
                format!("target {} is not a directory", resolved.display()),
            ));
        }

        Ok(resolved)
    }

    /// Resolve the indirection and list the regular, non-hidden files behind it.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Layout`] if resolution fails or the resolved
    /// directory cannot be listed.
    pub fn read(&self) -> Result<Layout> {
        let resolved_dir = self.resolve()?;
        let list_error =
            |e: std::io::Error| FlagError::layout(&resolved_dir, format!("cannot list: {}", e));

        let mut files = Vec::new();
        for entry in fs::read_dir(&resolved_dir).map_err(list_error)? {
            let entry = entry.map_err(list_error)?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(file = ?raw, dir = %resolved_dir.display(), "skipping non UTF-8 file name");
                    continue;
                }
            };
            if name.starts_with('.') || name == self.data_link {
                continue;
            }
            if !entry.file_type().map_err(list_error)?.is_file() {
                continue;
            }
            files.push(LayoutFile {
                name,
                path: entry.path(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Layout {
            resolved_dir,
            files,
        })
    }
}
