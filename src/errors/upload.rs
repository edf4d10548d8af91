use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

use super::{impl_into_response, AppError};

/// Infrastructure-tier failures of the upload pipeline.
///
/// These are the unexpected cases (unreadable multipart body, disk errors)
/// that propagate as non-200 responses. Expected outcomes like a rejected
/// MIME type are not errors and are reported through the response body.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read multipart field: {details}")]
    Multipart { details: String },

    #[error("Upload is missing the file field '{field}'")]
    MissingField { field: &'static str },

    #[error("Failed to store upload at {path:?}: {source}")]
    Store {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to inspect stored artifact {path:?}: {source}")]
    Inspect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Image filter could not rewrite {path:?}: {details}")]
    Filter { path: PathBuf, details: String },
}

impl AppError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::Multipart { .. } | UploadError::MissingField { .. } => {
                StatusCode::BAD_REQUEST
            }
            UploadError::Store { .. }
            | UploadError::Inspect { .. }
            | UploadError::Filter { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            UploadError::Multipart { .. } => "Could not read the uploaded form data".to_string(),
            UploadError::MissingField { field } => {
                format!("Upload must include a file field named '{}'", field)
            }
            UploadError::Store { .. } => "Could not store the uploaded file".to_string(),
            UploadError::Inspect { .. } => "Could not inspect the uploaded file".to_string(),
            UploadError::Filter { .. } => "Could not process the uploaded image".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            UploadError::Multipart { .. } => "UPLOAD_MULTIPART_INVALID",
            UploadError::MissingField { .. } => "UPLOAD_FIELD_MISSING",
            UploadError::Store { .. } => "UPLOAD_STORE_FAILED",
            UploadError::Inspect { .. } => "UPLOAD_INSPECT_FAILED",
            UploadError::Filter { .. } => "UPLOAD_FILTER_FAILED",
        }
    }
}

impl_into_response!(UploadError);
