//! Helpers for keeping log lines and span attributes small and free of
//! employee data.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the
/// per-employee directory layout.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Shortens free text (service responses, corpus excerpts) for logging.
///
/// Cuts on a character boundary and reports how much was dropped.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}… ({} more chars)", head, total - max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(&PathBuf::from("/data/employees/BIZ2025-0001/documents/cv.pdf")),
            "cv.pdf"
        );
    }

    #[test]
    fn test_redact_path_root() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_excerpt_short_text_untouched() {
        assert_eq!(excerpt("short", 10), "short");
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let text = "ééééé";
        assert_eq!(excerpt(text, 2), "éé… (3 more chars)");
    }
}
