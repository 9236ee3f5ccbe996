//! Resting places for processed artifacts: the append-only archive and the
//! quarantine area with its run-scoped report.

pub mod archive;
pub mod quarantine;

pub use archive::Archive;
pub use quarantine::QuarantineReport;

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

const MAX_CONFLICT_SUFFIX: u32 = 1000;

pub(crate) fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Writes `content` to a new file named `filename` inside `dir`.
///
/// Creation is exclusive (`O_CREAT | O_EXCL`), so an existing file is never
/// overwritten. On a clash the name gets a `_2`, `_3`, ... suffix before the
/// extension.
pub(crate) fn create_exclusive(
    dir: &Path,
    filename: &str,
    content: &[u8],
) -> Result<PathBuf, StorageError> {
    ensure_directory(dir)?;

    let (base, ext) = match filename.rfind('.') {
        Some(dot) if dot > 0 => (&filename[..dot], Some(&filename[dot..])),
        _ => (filename, None),
    };

    for counter in 1..=MAX_CONFLICT_SUFFIX {
        let candidate = if counter == 1 {
            filename.to_string()
        } else {
            match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            }
        };
        let path = dir.join(&candidate);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content).map_err(|e| StorageError::WriteFile {
                    path: path.clone(),
                    source: e,
                })?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        }
    }

    Err(StorageError::FileExists(dir.join(filename)))
}

/// Splits a file name into stem and extension (without the dot).
pub(crate) fn split_name(path: &Path) -> (String, Option<String>) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|e| !e.is_empty());
    (stem, ext)
}
