use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;
use crate::processor::DocumentConverter;

/// Plain text and markdown. Invalid UTF-8 is replaced, not rejected.
pub struct TextConverter;

impl TextConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter for TextConverter {
    fn convert_bytes(&self, bytes: &[u8]) -> Result<String, ProcessError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
