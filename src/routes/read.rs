use axum::{
    extract::{Multipart, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::error;

use crate::{
    errors::UploadError,
    models::{GreetingResponse, RecognitionResponse},
    pipeline::{UploadKind, UploadedFile},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(greeting))
        .route("/read", post(read_unified))
        .route("/read/image", post(read_image))
        .route("/read/file", post(read_file))
}

/// Health/smoke check
#[utoipa::path(
    get,
    path = "/",
    tag = "read",
    responses(
        (status = 200, description = "Service is up", body = GreetingResponse)
    )
)]
pub async fn greeting(State(state): State<Arc<AppState>>) -> Json<GreetingResponse> {
    Json(GreetingResponse {
        message: state.config.greeting.clone(),
    })
}

/// Recognize text in an uploaded image or PDF (single endpoint)
#[utoipa::path(
    post,
    path = "/read",
    tag = "read",
    request_body(content = String, description = "Multipart form with file field 'image'", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Recognition outcome", body = RecognitionResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn read_unified(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<RecognitionResponse>, UploadError> {
    let upload = extract_upload(multipart, "image").await?;
    let response = state.pipeline.process_upload(upload, UploadKind::Any).await?;
    Ok(Json(response))
}

/// Recognize text in an uploaded image
#[utoipa::path(
    post,
    path = "/read/image",
    tag = "read",
    request_body(content = String, description = "Multipart form with file field 'data'", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Recognition outcome", body = RecognitionResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn read_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<RecognitionResponse>, UploadError> {
    let upload = extract_upload(multipart, "data").await?;
    let response = state
        .pipeline
        .process_upload(upload, UploadKind::Image)
        .await?;
    Ok(Json(response))
}

/// Recognize text in an uploaded PDF document
#[utoipa::path(
    post,
    path = "/read/file",
    tag = "read",
    request_body(content = String, description = "Multipart form with file field 'data'", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Recognition outcome", body = RecognitionResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn read_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<RecognitionResponse>, UploadError> {
    let upload = extract_upload(multipart, "data").await?;
    let response = state.pipeline.process_upload(upload, UploadKind::Pdf).await?;
    Ok(Json(response))
}

/// Pull the named file field out of the multipart body.
///
/// A body that cannot be parsed, or that lacks the expected field, is a
/// transport error (400), not a pipeline outcome.
async fn extract_upload(
    mut multipart: Multipart,
    field_name: &'static str,
) -> Result<UploadedFile, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| {
            error!("Failed to read multipart field: {}", e);
            UploadError::Multipart {
                details: e.to_string(),
            }
        })?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            error!("Failed to read file data: {}", e);
            UploadError::Multipart {
                details: e.to_string(),
            }
        })?;

        return Ok(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(UploadError::MissingField { field: field_name })
}
