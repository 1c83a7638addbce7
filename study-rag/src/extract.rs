//! Turning uploaded bytes into text.

use crate::error::{RagError, Result};

/// Decodes the bytes of an upload into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract the text content of `bytes`.
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Treats uploads as UTF-8 text, replacing invalid sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Extracts the text layer of a PDF, page by page.
///
/// This type is only available when the `pdf` feature is enabled.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| RagError::Extraction(format!("could not read PDF: {e}")))
    }
}

/// Pick an extractor from the upload's file name.
///
/// # Errors
///
/// Returns [`RagError::Extraction`] for PDFs when the `pdf` feature is off.
pub fn extractor_for(file_name: &str) -> Result<Box<dyn TextExtractor>> {
    if file_name.to_lowercase().ends_with(".pdf") {
        #[cfg(feature = "pdf")]
        return Ok(Box::new(PdfTextExtractor));
        #[cfg(not(feature = "pdf"))]
        return Err(RagError::Extraction(
            "PDF support is not enabled in this build".to_string(),
        ));
    }
    Ok(Box::new(PlainTextExtractor))
}
