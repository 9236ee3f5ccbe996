//! Provenance blocks wrapped around each document in an aggregated corpus.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::StorageError;

pub const START_MARKER: &str = "=== START DOCUMENT ===";
pub const END_MARKER: &str = "=== END DOCUMENT ===";

/// Renders one provenance block around `text`.
pub fn format_block(source: &Path, text: &str, processed_at: DateTime<Local>) -> String {
    format!(
        "\n{}\nPath: {}\nProcessed on: {}\n\n{}\n{}\n",
        START_MARKER,
        source.display(),
        processed_at.format("%Y-%m-%d %H:%M:%S"),
        text.trim(),
        END_MARKER
    )
}

/// Appends a provenance block to `output`, creating the file and its parent
/// directory if needed. Existing content is never overwritten.
pub fn append_block(output: &Path, source: &Path, text: &str) -> Result<(), StorageError> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let block = format_block(source, text, Local::now());
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(output)
        .map_err(|e| StorageError::WriteFile {
            path: output.to_path_buf(),
            source: e,
        })?;

    file.write_all(block.as_bytes())
        .map_err(|e| StorageError::WriteFile {
            path: output.to_path_buf(),
            source: e,
        })
}

/// Counts the documents recorded in a corpus.
pub fn count_blocks(corpus: &str) -> usize {
    corpus.lines().filter(|l| *l == START_MARKER).count()
}
