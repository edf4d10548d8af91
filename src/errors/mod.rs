use axum::http::StatusCode;

pub mod upload;

pub use upload::UploadError;

/// Common trait for custom error types surfaced over HTTP.
///
/// Only infrastructure-tier failures implement this; structured pipeline
/// outcomes are `RecognitionResponse` values and never become errors.
pub trait AppError: std::error::Error + Send + Sync + 'static {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get the error code for client handling
    fn error_code(&self) -> &'static str;
}

/// Macro to implement IntoResponse for all AppError types.
/// This provides consistent HTTP response formatting.
macro_rules! impl_into_response {
    ($error_type:ty) => {
        impl axum::response::IntoResponse for $error_type {
            fn into_response(self) -> axum::response::Response {
                use crate::errors::AppError;
                use axum::response::Json;
                use serde_json::json;

                tracing::error!(
                    code = self.error_code(),
                    "request failed: {}", self
                );

                let status = self.status_code();
                let body = Json(json!({
                    "error": self.user_message(),
                    "code": self.error_code(),
                    "status": status.as_u16()
                }));

                (status, body).into_response()
            }
        }
    };
}

pub(crate) use impl_into_response;
