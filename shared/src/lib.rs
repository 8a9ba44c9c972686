use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassificationView {
    pub label: String,
    pub score: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub is_ai_generated: bool,
    pub confidence: f64,
    pub classifications: Vec<ClassificationView>,
}

/// Coarse error category reported in the `error` field of an [`ErrorBody`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[strum(serialize = "Invalid input")]
    InvalidInput,
    #[strum(serialize = "Method not allowed")]
    MethodNotAllowed,
    #[strum(serialize = "Service unavailable")]
    ServiceUnavailable,
    #[strum(serialize = "Failed to analyze image")]
    Internal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            error: kind.to_string(),
            details: details.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub classifier_configured: bool,
    pub model: String,
}
