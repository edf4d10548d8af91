//! Legibility filter chain applied before recognition.
//!
//! Mirrors the classic scan-cleanup recipe: grayscale, an edge-preserving
//! median smoothing pass to knock out sensor noise, then a linear
//! contrast/brightness rescale. The artifact is rewritten in place so the
//! recognizer always reads the filtered file.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "ocr")]
use image::{GrayImage, ImageBuffer, Luma};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Image could not be decoded")]
    Undecodable,

    #[error("Filtered image could not be written: {details}")]
    Save { details: String },

    #[error("Filter task panicked: {details}")]
    TaskPanicked { details: String },
}

/// In-place image pre-processing seam; substitutable in tests.
#[async_trait]
pub trait ImageFilter: Send + Sync {
    async fn filter(&self, image_path: &Path) -> Result<(), FilterError>;
}

/// The production filter: grayscale → median smoothing → linear rescale.
#[cfg(feature = "ocr")]
pub struct RescaleFilter {
    gain: f32,
    offset: f32,
    smoothing_radius: u32,
}

#[cfg(feature = "ocr")]
impl RescaleFilter {
    pub fn new(gain: f32, offset: f32, smoothing_radius: u32) -> Self {
        Self {
            gain,
            offset,
            smoothing_radius,
        }
    }
}

#[cfg(feature = "ocr")]
#[async_trait]
impl ImageFilter for RescaleFilter {
    async fn filter(&self, image_path: &Path) -> Result<(), FilterError> {
        let path = image_path.to_path_buf();
        let (gain, offset, radius) = (self.gain, self.offset, self.smoothing_radius);

        tokio::task::spawn_blocking(move || filter_blocking(&path, gain, offset, radius))
            .await
            .map_err(|e| FilterError::TaskPanicked {
                details: e.to_string(),
            })?
    }
}

#[cfg(feature = "ocr")]
fn filter_blocking(path: &Path, gain: f32, offset: f32, radius: u32) -> Result<(), FilterError> {
    let img = image::open(path).map_err(|_| FilterError::Undecodable)?;
    let gray = img.to_luma8();
    let smoothed = imageproc::filter::median_filter(&gray, radius, radius);
    let rescaled = rescale(&smoothed, gain, offset);

    // Overwrite in place, keeping the container format the extension implies
    // so the artifact name stays truthful.
    let format = image::ImageFormat::from_path(path).unwrap_or(image::ImageFormat::Png);
    image::DynamicImage::ImageLuma8(rescaled)
        .save_with_format(path, format)
        .map_err(|e| FilterError::Save {
            details: e.to_string(),
        })
}

/// Saturating `v * gain + offset` over every luma pixel.
#[cfg(feature = "ocr")]
fn rescale(gray: &GrayImage, gain: f32, offset: f32) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0] as f32 * gain + offset;
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

/// No-op filter for builds without the `ocr` feature.
#[cfg(not(feature = "ocr"))]
pub struct NoopFilter;

#[cfg(not(feature = "ocr"))]
#[async_trait]
impl ImageFilter for NoopFilter {
    async fn filter(&self, _image_path: &Path) -> Result<(), FilterError> {
        Ok(())
    }
}
