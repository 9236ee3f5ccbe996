//! Change detection by modification time.
//!
//! A fingerprint set maps source file names to their last-seen modification
//! time (seconds since the epoch, sub-second precision) and is persisted as
//! a JSON side file. Comparison is by raw timestamp equality: a file whose
//! content changes while its timestamp does not (for example one restored
//! from a backup with preserved times) is not detected.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::StorageError;

/// File name → modification time in seconds.
pub type Fingerprints = BTreeMap<String, f64>;

/// Outcome of comparing stored fingerprints against the current file set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FingerprintDiff {
    pub changed: bool,
    /// New files and files whose timestamp moved.
    pub to_add: Vec<String>,
    /// Files that were recorded but are gone.
    pub to_remove: Vec<String>,
}

pub struct FingerprintStore {
    path: PathBuf,
    stored: Fingerprints,
    persisted: bool,
}

impl FingerprintStore {
    /// Loads the side file at `path`. A missing file yields an empty set; an
    /// unreadable or corrupt one is logged and also treated as empty, which
    /// forces a full rebuild.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    stored: Fingerprints::new(),
                    persisted: false,
                })
            }
            Err(e) => return Err(StorageError::ReadFile { path, source: e }),
        };

        let stored = match serde_json::from_str::<Fingerprints>(&content) {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!(
                    "Ignoring corrupt fingerprint file {}: {}",
                    path.display(),
                    e
                );
                Fingerprints::new()
            }
        };

        Ok(Self {
            path,
            stored,
            persisted: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once a fingerprint set has been written for this store.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn entries(&self) -> &Fingerprints {
        &self.stored
    }

    /// True if `name` is recorded with exactly `modified`.
    pub fn is_current(&self, name: &str, modified: f64) -> bool {
        self.stored.get(name) == Some(&modified)
    }

    pub fn diff(&self, current: &Fingerprints) -> FingerprintDiff {
        let to_add: Vec<String> = current
            .iter()
            .filter(|(name, modified)| self.stored.get(*name) != Some(*modified))
            .map(|(name, _)| name.clone())
            .collect();

        let to_remove: Vec<String> = self
            .stored
            .keys()
            .filter(|name| !current.contains_key(*name))
            .cloned()
            .collect();

        FingerprintDiff {
            changed: !to_add.is_empty() || !to_remove.is_empty(),
            to_add,
            to_remove,
        }
    }

    /// Replaces the stored set with `current` and writes it out.
    pub fn commit(&mut self, current: Fingerprints) -> Result<(), StorageError> {
        self.stored = current;
        self.save()
    }

    /// Records a single entry in memory. Call [`save`](Self::save) to persist.
    pub fn record(&mut self, name: impl Into<String>, modified: f64) {
        self.stored.insert(name.into(), modified);
    }

    /// Forgets a single entry in memory.
    pub fn forget(&mut self, name: &str) {
        self.stored.remove(name);
    }

    /// Writes the side file through a temporary sibling and a rename, so a
    /// crash never leaves a half-written record behind.
    pub fn save(&mut self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.stored).map_err(|e| {
            StorageError::WriteFile {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| StorageError::WriteFile {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StorageError::WriteFile {
            path: self.path.clone(),
            source: e,
        })?;

        self.persisted = true;
        Ok(())
    }
}

/// Modification time of `path` in seconds since the epoch.
pub fn modified_secs(path: &Path) -> Result<f64, StorageError> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0))
}

/// Builds the fingerprint set for `paths`, keyed by file name.
pub fn snapshot(paths: &[PathBuf]) -> Result<Fingerprints, StorageError> {
    let mut fingerprints = Fingerprints::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        fingerprints.insert(name, modified_secs(path)?);
    }
    Ok(fingerprints)
}
