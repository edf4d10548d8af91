//! Content-type sniffing for stored artifacts.
//!
//! Detection is strictly content-based: the magic bytes of the stored file
//! decide the type, never the client-supplied `Content-Type` header or the
//! filename extension. Trusting either of those would let a caller smuggle an
//! arbitrary payload past the allow-list, so the extension is only consulted
//! to log a mismatch warning.

use std::path::Path;
use tracing::{debug, warn};

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_PDF: &str = "application/pdf";

/// Sniffed MIME type of one stored artifact. Determined once per artifact and
/// never cached beyond the request that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedContentType {
    pub mime_type: String,
}

impl DetectedContentType {
    pub fn is_pdf(&self) -> bool {
        self.mime_type == MIME_PDF
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Check the sniffed type against a caller-supplied allow-list.
    pub fn is_allowed(&self, allowed: &[String]) -> bool {
        allowed.iter().any(|a| a == &self.mime_type)
    }
}

/// Detect the MIME type from file content (magic bytes).
///
/// Returns `None` when the bytes match no known signature; callers treat an
/// unknown type the same as a disallowed one.
pub fn sniff_bytes(content: &[u8]) -> Option<DetectedContentType> {
    let detected = infer::get(content)?;
    debug!("Magic bytes detected MIME type: {}", detected.mime_type());
    Some(DetectedContentType {
        mime_type: detected.mime_type().to_string(),
    })
}

/// Sniff a stored artifact from disk.
///
/// Reads the signature prefix only; `infer` needs no more than the first few
/// kilobytes for every type we accept.
pub async fn sniff_file(path: &Path) -> std::io::Result<Option<DetectedContentType>> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut prefix = vec![0u8; 8192];
    let n = file.read(&mut prefix).await?;
    prefix.truncate(n);

    let detected = sniff_bytes(&prefix);

    if let Some(ref detected) = detected {
        if let Some(guessed) = mime_guess::from_path(path).first() {
            if guessed.essence_str() != detected.mime_type {
                warn!(
                    "MIME mismatch for {:?}: extension suggests {}, content is {}",
                    path.file_name().unwrap_or_default(),
                    guessed.essence_str(),
                    detected.mime_type
                );
            }
        }
    }

    Ok(detected)
}
