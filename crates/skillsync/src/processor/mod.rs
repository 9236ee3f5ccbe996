//! Format converters: turn an uploaded document into plain text.
//!
//! Each supported format has its own [`DocumentConverter`]; the
//! [`ConverterRegistry`] routes a file to the converter for its declared or
//! implied format, so callers never need to know which variant ran.

pub mod docx;
pub mod pdf;
pub mod provenance;
pub mod text;

use std::path::{Path, PathBuf};

use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;

/// Plain text produced from one source document.
#[derive(Debug, Clone)]
pub struct ConvertedText {
    pub source: PathBuf,
    pub format: DocumentFormat,
    pub text: String,
}

pub trait DocumentConverter: Send + Sync {
    /// Converts an in-memory document.
    fn convert_bytes(&self, bytes: &[u8]) -> Result<String, ProcessError>;

    fn supports(&self, format: DocumentFormat) -> bool;

    /// Converts the document at `path`.
    fn convert(&self, path: &Path) -> Result<String, ProcessError> {
        let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
        self.convert_bytes(&bytes)
    }
}

/// Maps an IO failure on a source document into the converter taxonomy.
pub(crate) fn read_error(path: &Path, err: std::io::Error) -> ProcessError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ProcessError::NotFound(path.to_path_buf())
    } else {
        ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

/// Determines the implied format of `path` from its extension, falling back
/// to the MIME type guessed from the file name.
pub fn format_of(path: &Path) -> Result<DocumentFormat, ProcessError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    DocumentFormat::from_extension(extension)
        .or_else(|| {
            mime_guess::from_path(path)
                .iter()
                .find_map(|mime| DocumentFormat::from_mime(mime.essence_str()))
        })
        .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))
}

pub struct ConverterRegistry {
    converters: Vec<Box<dyn DocumentConverter>>,
}

impl ConverterRegistry {
    /// Registry with the built-in PDF, DOCX and plain-text converters.
    pub fn new() -> Self {
        Self {
            converters: vec![
                Box::new(text::TextConverter::new()),
                Box::new(pdf::PdfConverter::new()),
                Box::new(docx::DocxConverter::new()),
            ],
        }
    }

    /// Registry with exactly the given converters.
    pub fn with_converters(converters: Vec<Box<dyn DocumentConverter>>) -> Self {
        Self { converters }
    }

    /// Adds a converter. Later registrations take precedence.
    pub fn register(&mut self, converter: Box<dyn DocumentConverter>) {
        self.converters.insert(0, converter);
    }

    /// Returns true if some converter handles the implied format of `path`.
    pub fn supports_path(&self, path: &Path) -> bool {
        format_of(path)
            .map(|format| self.converters.iter().any(|c| c.supports(format)))
            .unwrap_or(false)
    }

    /// Converts `path` using the format implied by its name.
    pub fn convert(&self, path: &Path) -> Result<ConvertedText, ProcessError> {
        let format = format_of(path)?;
        self.convert_as(path, format)
    }

    /// Converts `path` using a format declared by the caller as a MIME type.
    pub fn convert_declared(&self, path: &Path, mime: &str) -> Result<ConvertedText, ProcessError> {
        let format = DocumentFormat::from_mime(mime)
            .ok_or_else(|| ProcessError::UnsupportedFormat(mime.to_string()))?;
        self.convert_as(path, format)
    }

    /// Converts `path` as `format`, regardless of its name.
    pub fn convert_as(
        &self,
        path: &Path,
        format: DocumentFormat,
    ) -> Result<ConvertedText, ProcessError> {
        let converter = self.converter_for(format)?;

        if !path.exists() {
            return Err(ProcessError::NotFound(path.to_path_buf()));
        }

        let text = converter.convert(path)?;
        Ok(ConvertedText {
            source: path.to_path_buf(),
            format,
            text,
        })
    }

    /// Converts an in-memory document of the given format.
    pub fn convert_bytes(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<String, ProcessError> {
        self.converter_for(format)?.convert_bytes(bytes)
    }

    fn converter_for(
        &self,
        format: DocumentFormat,
    ) -> Result<&dyn DocumentConverter, ProcessError> {
        self.converters
            .iter()
            .find(|c| c.supports(format))
            .map(|c| c.as_ref())
            .ok_or_else(|| ProcessError::UnsupportedFormat(format.extension().to_string()))
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
