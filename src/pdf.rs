//! Process-wide PDF text engine.
//!
//! The engine is created on first use through a `tokio::sync::OnceCell`:
//! concurrent first callers await the same initialization and later callers
//! reuse it. Decoding runs on the blocking pool, bounded by a semaphore so a
//! batch of large PDFs cannot occupy every blocking thread.

use thiserror::Error;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info};

static ENGINE: OnceCell<PdfTextEngine> = OnceCell::const_new();

/// Magic bytes every PDF starts with (after optional leading whitespace).
const PDF_MAGIC: &[u8] = b"%PDF";

/// Errors from PDF text conversion.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The payload is not a PDF (often an HTML interstitial or error page).
    #[error("response is not a PDF (starts with {prefix:?})")]
    NotPdf {
        /// First bytes of the payload, lossily decoded.
        prefix: String,
    },

    /// The PDF could not be decoded.
    #[error("could not decode PDF: {0}")]
    Decode(String),

    /// The decoding task panicked or was cancelled.
    #[error("PDF worker failed: {0}")]
    Worker(String),
}

/// Shared PDF-to-text converter.
#[derive(Debug)]
pub struct PdfTextEngine {
    permits: Semaphore,
}

impl PdfTextEngine {
    fn new(max_parallel: usize) -> Self {
        Self {
            permits: Semaphore::new(max_parallel.max(1)),
        }
    }

    /// Returns the process-wide engine, creating it on first call.
    pub async fn global() -> &'static Self {
        ENGINE
            .get_or_init(|| async {
                let parallel = std::thread::available_parallelism().map_or(2, usize::from);
                info!(max_parallel = parallel, "initializing PDF text engine");
                Self::new(parallel)
            })
            .await
    }

    /// Converts PDF bytes to plain text.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::NotPdf`] when the payload lacks the PDF header,
    /// [`PdfError::Decode`] when decoding fails, and [`PdfError::Worker`] when
    /// the blocking task panics.
    pub async fn extract_text(&self, bytes: Vec<u8>) -> Result<String, PdfError> {
        if !looks_like_pdf(&bytes) {
            let prefix = String::from_utf8_lossy(&bytes[..bytes.len().min(16)]).into_owned();
            return Err(PdfError::NotPdf { prefix });
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PdfError::Worker(e.to_string()))?;
        debug!(bytes = bytes.len(), "decoding PDF");
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| PdfError::Worker(e.to_string()))?
            .map_err(|e| PdfError::Decode(e.to_string()))
    }
}

/// True when the payload starts with `%PDF`, ignoring leading whitespace.
#[must_use]
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(PDF_MAGIC)
}
