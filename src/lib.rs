pub mod config;
pub mod errors;
pub mod middleware;
pub mod mime_detection;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod routes;
pub mod services;
pub mod swagger;

use anyhow::Result;
use axum::http::{header, HeaderValue};
use axum::Router;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::CompressionLevel;

use config::Config;
use pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
}

/// Assemble the full application router: recognition routes, swagger, the
/// response-compression and security-header layers, and per-request logging.
pub fn build_router(state: Arc<AppState>) -> Result<Router> {
    let hsts = HeaderValue::from_str(&format!("max-age={}", state.config.hsts_max_age))?;
    let compression_level = state.config.compression_level;

    let router = Router::new()
        .merge(routes::read::router())
        .merge(swagger::create_swagger_router())
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            hsts,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(
            CompressionLayer::new()
                .gzip(true)
                .quality(CompressionLevel::Precise(compression_level)),
        )
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .with_state(state);

    Ok(router)
}
