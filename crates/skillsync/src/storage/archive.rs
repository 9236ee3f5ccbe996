use std::path::{Path, PathBuf};

use chrono::Local;

use super::{create_exclusive, split_name};
use crate::error::StorageError;

/// Append-only archive of successfully reconciled files.
///
/// Sources are copied, never moved, so the original upload stays where it
/// was for audit.
pub struct Archive {
    directory: PathBuf,
}

impl Archive {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Copies `source` to `<archive>/<business_id>_<YYYYmmdd_HHMMSS>.<ext>`.
    pub fn store(&self, source: &Path, business_id: &str) -> Result<PathBuf, StorageError> {
        let content = std::fs::read(source).map_err(|e| StorageError::ReadFile {
            path: source.to_path_buf(),
            source: e,
        })?;

        let (_, ext) = split_name(source);
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = match ext {
            Some(ext) => format!("{}_{}.{}", business_id, stamp, ext),
            None => format!("{}_{}", business_id, stamp),
        };

        let archived = create_exclusive(&self.directory, &filename, &content).map_err(|e| {
            match e {
                StorageError::WriteFile { source: io, .. } => StorageError::CopyFile {
                    from: source.to_path_buf(),
                    to: self.directory.join(&filename),
                    source: io,
                },
                other => other,
            }
        })?;

        log::info!("Archived {} as {}", source.display(), archived.display());
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_copies_with_business_id_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("skills.json");
        std::fs::write(&source, r#"{"skills": []}"#).unwrap();

        let archive = Archive::new(dir.path().join("processed"));
        let archived = archive.store(&source, "BIZ2025-0001").unwrap();

        let name = archived.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("BIZ2025-0001_"));
        assert!(name.ends_with(".json"));
        assert!(source.exists(), "source must stay in place");
        assert_eq!(
            std::fs::read_to_string(&archived).unwrap(),
            r#"{"skills": []}"#
        );
    }

    #[test]
    fn test_repeated_store_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("skills.json");
        std::fs::write(&source, "{}").unwrap();

        let archive = Archive::new(dir.path().join("processed"));
        let first = archive.store(&source, "BIZ2025-0001").unwrap();
        let second = archive.store(&source, "BIZ2025-0001").unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn test_missing_source_is_read_error() {
        let dir = TempDir::new().unwrap();
        let archive = Archive::new(dir.path());
        assert!(matches!(
            archive.store(&dir.path().join("gone.json"), "BIZ2025-0001"),
            Err(StorageError::ReadFile { .. })
        ));
    }
}
