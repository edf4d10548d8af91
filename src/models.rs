use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Wire shape returned by every recognition endpoint.
///
/// `message` is empty on success and carries a short failure tag otherwise;
/// `data` holds the recognized text and is only populated when `message` is
/// empty. Pipeline outcomes are domain results, not transport errors, so this
/// body always travels with a 200 status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecognitionResponse {
    pub message: String,
    pub data: String,
}

impl RecognitionResponse {
    pub fn success(data: String) -> Self {
        Self {
            message: String::new(),
            data,
        }
    }

    pub fn failure(tag: &str) -> Self {
        Self {
            message: tag.to_string(),
            data: String::new(),
        }
    }
}

/// Body of the `GET /` smoke check.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GreetingResponse {
    pub message: String,
}
