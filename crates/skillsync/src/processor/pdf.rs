use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;
use crate::processor::DocumentConverter;

/// Text layer extraction, one newline-terminated block per page.
///
/// Scanned PDFs without a text layer convert to empty text; there is no OCR.
pub struct PdfConverter;

impl PdfConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter for PdfConverter {
    fn convert_bytes(&self, bytes: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.pdf", bytes = bytes.len()).entered();

        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        Ok(extract_text_from_pdf(&doc))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(page_text.trim_end());
                text.push('\n');
            }
            Err(e) => log::debug!("Skipping unreadable PDF page {}: {}", page_num, e),
        }
    }

    text
}
