pub mod preprocess;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "ocr")]
use std::time::Duration;
#[cfg(feature = "ocr")]
use tesseract::Tesseract;
#[cfg(feature = "ocr")]
use tracing::debug;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Tesseract initialization failed: {details}")]
    InitializationFailed { details: String },

    #[error("Text recognition failed: {details}")]
    RecognitionFailed { details: String },

    #[error("OCR timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("OCR support is not compiled into this build")]
    Disabled,

    #[error("OCR task panicked: {details}")]
    TaskPanicked { details: String },
}

/// Text recognition over a single image file.
///
/// The engine is acquired per call and released on every exit path; no
/// native handle outlives one recognition pass.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image_path: &Path) -> Result<String, OcrError>;
}

/// Tesseract-backed recognition with a bounded per-call timeout.
#[cfg(feature = "ocr")]
pub struct TesseractEngine {
    language: String,
    timeout: Duration,
}

#[cfg(feature = "ocr")]
impl TesseractEngine {
    pub fn new(language: &str, timeout_seconds: u64) -> Self {
        Self {
            language: language.to_string(),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }
}

#[cfg(feature = "ocr")]
#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        let path = image_path.to_string_lossy().into_owned();
        let language = self.language.clone();
        let seconds = self.timeout.as_secs();

        // Tesseract is CPU-bound and synchronous; keep it off the async
        // workers. On timeout the blocking task is detached since tesseract
        // has no cancellation hook.
        let task = tokio::task::spawn_blocking(move || -> Result<String, OcrError> {
            let tesseract = Tesseract::new(None, Some(&language)).map_err(|e| {
                OcrError::InitializationFailed {
                    details: e.to_string(),
                }
            })?;
            let mut tesseract =
                tesseract
                    .set_image(&path)
                    .map_err(|e| OcrError::RecognitionFailed {
                        details: e.to_string(),
                    })?;
            let text = tesseract
                .get_text()
                .map_err(|e| OcrError::RecognitionFailed {
                    details: e.to_string(),
                })?;
            Ok(text.trim().to_string())
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(OcrError::Timeout { seconds }),
            Ok(Err(join)) => Err(OcrError::TaskPanicked {
                details: join.to_string(),
            }),
            Ok(Ok(result)) => {
                if let Ok(ref text) = result {
                    debug!("OCR recognized {} words", text.split_whitespace().count());
                }
                result
            }
        }
    }
}

/// Stand-in engine for builds without the `ocr` feature; every call reports
/// a recognition failure so requests still get a structured outcome.
#[cfg(not(feature = "ocr"))]
pub struct DisabledOcrEngine;

#[cfg(not(feature = "ocr"))]
#[async_trait]
impl OcrEngine for DisabledOcrEngine {
    async fn recognize(&self, _image_path: &Path) -> Result<String, OcrError> {
        Err(OcrError::Disabled)
    }
}
