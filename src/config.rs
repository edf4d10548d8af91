use anyhow::Result;
use std::env;

/// Process-wide configuration for the recognition service.
///
/// Every knob the pipeline consumes (allow-lists, filter constants, OCR
/// bounds, artifact retention) lives here so the pipeline is constructed
/// from explicit configuration instead of scattered literals.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_address: String,
    pub upload_path: String,
    pub greeting: String,
    pub allowed_image_types: Vec<String>,
    pub ocr_language: String,
    pub ocr_timeout_seconds: u64,
    pub filter_gain: f32,
    pub filter_offset: f32,
    pub filter_smoothing_radius: u32,
    pub pdf_enabled: bool,
    pub pdf_render_width: u32,
    pub retain_artifacts: bool,
    pub hsts_max_age: u64,
    pub compression_level: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:1234".to_string()),
            upload_path: env::var("UPLOAD_PATH").unwrap_or_else(|_| "./upload".to_string()),
            greeting: env::var("GREETING").unwrap_or_else(|_| "hello borld!".to_string()),
            allowed_image_types: env::var("ALLOWED_IMAGE_TYPES")
                .unwrap_or_else(|_| "image/jpeg,image/png".to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .collect(),
            ocr_language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
            ocr_timeout_seconds: env::var("OCR_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
            filter_gain: env::var("FILTER_GAIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.5),
            filter_offset: env::var("FILTER_OFFSET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25.0),
            filter_smoothing_radius: env::var("FILTER_SMOOTHING_RADIUS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            pdf_enabled: env::var("PDF_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            pdf_render_width: env::var("PDF_RENDER_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2048),
            retain_artifacts: env::var("RETAIN_ARTIFACTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            hsts_max_age: env::var("HSTS_MAX_AGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            compression_level: env::var("COMPRESSION_LEVEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_address: "127.0.0.1:0".to_string(),
            upload_path: "./upload".to_string(),
            greeting: "hello borld!".to_string(),
            allowed_image_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
            ocr_language: "eng".to_string(),
            ocr_timeout_seconds: 120,
            filter_gain: 1.5,
            filter_offset: 25.0,
            filter_smoothing_radius: 2,
            pdf_enabled: true,
            pdf_render_width: 2048,
            retain_artifacts: false,
            hsts_max_age: 3600,
            compression_level: 5,
        }
    }
}
