//! PDF rasterization: render document pages to JPEG artifacts via pdfium.
//!
//! pdfium keeps thread-local state and must not run on async workers, so all
//! rendering happens inside `spawn_blocking`. A failure on any page is
//! reported as a structured error for that request; it never terminates the
//! process.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(feature = "pdf")]
use tracing::debug;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Document could not be opened: {details}")]
    Corrupt { details: String },

    #[error("Page {page} could not be rendered: {details}")]
    PageRender { page: usize, details: String },

    #[error("Page {page} image could not be encoded: {details}")]
    PageEncode { page: usize, details: String },

    #[error("PDF support is not compiled into this build")]
    Disabled,

    #[error("Render task panicked: {details}")]
    TaskPanicked { details: String },
}

/// Document-to-page-images seam; substitutable in tests.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Render every page of `pdf_path` into `out_dir` as
    /// `<stem>.<page:03>.jpg`, returning the page image paths in page order.
    async fn rasterize(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, RenderError>;
}

#[cfg(feature = "pdf")]
pub struct PdfiumRenderer {
    target_width: i32,
}

#[cfg(feature = "pdf")]
impl PdfiumRenderer {
    pub fn new(target_width: u32) -> Self {
        Self {
            target_width: target_width as i32,
        }
    }
}

#[cfg(feature = "pdf")]
#[async_trait]
impl PdfRenderer for PdfiumRenderer {
    async fn rasterize(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, RenderError> {
        let pdf_path = pdf_path.to_path_buf();
        let out_dir = out_dir.to_path_buf();
        let stem = stem.to_string();
        let width = self.target_width;

        tokio::task::spawn_blocking(move || rasterize_blocking(&pdf_path, &out_dir, &stem, width))
            .await
            .map_err(|e| RenderError::TaskPanicked {
                details: e.to_string(),
            })?
    }
}

#[cfg(feature = "pdf")]
fn rasterize_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    stem: &str,
    target_width: i32,
) -> Result<Vec<PathBuf>, RenderError> {
    use pdfium_render::prelude::*;

    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| RenderError::Corrupt {
            details: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_maximum_height(target_width);

    let mut paths = Vec::with_capacity(document.pages().len() as usize);
    for (index, page) in document.pages().iter().enumerate() {
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| RenderError::PageRender {
                    page: index,
                    details: format!("{:?}", e),
                })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} to {}x{} px",
            index,
            image.width(),
            image.height()
        );

        let path = out_dir.join(format!("{}.{:03}.jpg", stem, index));
        image
            .to_rgb8()
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .map_err(|e| RenderError::PageEncode {
                page: index,
                details: e.to_string(),
            })?;
        paths.push(path);
    }

    Ok(paths)
}

/// Stand-in renderer for builds without the `pdf` feature.
#[cfg(not(feature = "pdf"))]
pub struct DisabledPdfRenderer;

#[cfg(not(feature = "pdf"))]
#[async_trait]
impl PdfRenderer for DisabledPdfRenderer {
    async fn rasterize(
        &self,
        _pdf_path: &Path,
        _out_dir: &Path,
        _stem: &str,
    ) -> Result<Vec<PathBuf>, RenderError> {
        Err(RenderError::Disabled)
    }
}
