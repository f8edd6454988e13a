//! Post-processing of the site's build output.
//!
//! After the frontend build writes its bundle, [`ExcludeAssets`] removes every file matched by one of
//! the configured [`AssetExclusion`] rules. The default rule drops the `NotoSansSC` TrueType fonts,
//! which must never ship with the deployed site. Bundles without matching files are left untouched.
//!
//! The hook works on an in-memory [`Bundle`] or directly on an output directory
//! ([`ExcludeAssets::prune_dir`]). File names are bundle-relative paths using `/` as separator, e.g.
//! `assets/NotoSansSC-Regular.ttf`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle directory {} does not exist", .0.display())]
    MissingDir(PathBuf),

    #[error("failed to walk bundle directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to {operation} {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Excludes files whose name ends with `extension` and contains `contains`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssetExclusion {
    pub extension: String,
    pub contains: String,
}

impl AssetExclusion {
    pub fn new(extension: impl Into<String>, contains: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            contains: contains.into(),
        }
    }

    pub fn noto_sans_sc() -> Self {
        Self::new(".ttf", "NotoSansSC")
    }

    /// Case-sensitive, like the bundler's own file names.
    pub fn matches(&self, name: &str) -> bool {
        name.ends_with(&self.extension) && name.contains(&self.contains)
    }
}

/// Build output: bundle-relative file names mapped to their contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    files: BTreeMap<String, Vec<u8>>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), contents.into());
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read every regular file under `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, BundleError> {
        if !dir.is_dir() {
            return Err(BundleError::MissingDir(dir.to_path_buf()));
        }

        let mut bundle = Self::new();
        for (name, path) in bundle_files(dir)? {
            let contents = std::fs::read(&path).map_err(|source| BundleError::Io {
                operation: "read",
                path: path.clone(),
                source,
            })?;
            bundle.insert(name, contents);
        }
        Ok(bundle)
    }

    /// Write every file under `dir`, creating parent directories as needed.
    pub fn write_to(&self, dir: &Path) -> Result<(), BundleError> {
        for (name, contents) in &self.files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| BundleError::Io {
                    operation: "create directory",
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::write(&path, contents).map_err(|source| BundleError::Io {
                operation: "write",
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// The bundle hook: drops every file matched by one of its rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeAssets {
    rules: Vec<AssetExclusion>,
}

impl ExcludeAssets {
    pub fn new(rules: Vec<AssetExclusion>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[AssetExclusion] {
        &self.rules
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(name))
    }

    /// Remove matching entries from `bundle`, returning the removed names.
    pub fn apply(&self, bundle: &mut Bundle) -> Vec<String> {
        let removed: Vec<String> = bundle.names().filter(|name| self.is_excluded(name)).map(str::to_string).collect();
        for name in &removed {
            bundle.files.remove(name);
            debug!(file = %name, "excluded asset from bundle");
        }
        removed
    }

    /// Delete matching files from the build output directory `dir`, returning the removed paths.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::MissingDir`] if `dir` is not a directory, and an I/O error if walking
    /// the tree or deleting a file fails.
    pub fn prune_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
        if !dir.is_dir() {
            return Err(BundleError::MissingDir(dir.to_path_buf()));
        }

        let matched: Vec<(String, PathBuf)> = bundle_files(dir)?.into_iter().filter(|(name, _)| self.is_excluded(name)).collect();

        let mut removed = Vec::with_capacity(matched.len());
        for (name, path) in matched {
            std::fs::remove_file(&path).map_err(|source| BundleError::Io {
                operation: "remove",
                path: path.clone(),
                source,
            })?;
            debug!(file = %name, "removed excluded asset");
            removed.push(path);
        }
        Ok(removed)
    }
}

/// Files under `root` as (bundle-relative name, path) pairs.
///
/// Symlinks are listed under their own name unless they point at a directory, so a linked file
/// is matched and removed like a regular one. Links are not followed into other trees.
fn bundle_files(root: &Path) -> Result<Vec<(String, PathBuf)>, BundleError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();
        let is_file = file_type.is_file() || (file_type.is_symlink() && !entry.path().is_dir());
        if !is_file {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, entry.path().to_path_buf()));
    }
    Ok(files)
}
