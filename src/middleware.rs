//! Per-request structured logging.
//!
//! Emits exactly one log line per request with the remote address, method,
//! path, status, latency, and byte counts, after the response is built.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

pub async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let bytes_in = content_length(req.headers());

    let start = Instant::now();
    let response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let status = response.status();
    let bytes_out = content_length(response.headers());

    info!(
        remote_ip = %remote_ip,
        method = %method,
        uri = %uri,
        status = status.as_u16(),
        error = status.is_client_error() || status.is_server_error(),
        latency_ms,
        bytes_in,
        bytes_out,
        "request completed"
    );

    response
}

fn content_length(headers: &axum::http::HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
