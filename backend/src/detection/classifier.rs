use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::resolver::ResolvedImage;
use super::retry::Retryable;
use crate::config::ClassifierConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationItem {
    pub label: String,
    pub score: f64,
}

#[cfg(test)]
impl ClassificationItem {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Classifier returned HTTP {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("Classifier response could not be parsed: {0}")]
    InvalidResponse(String),
}

impl Retryable for ClassifierError {
    fn is_retryable(&self) -> bool {
        match self {
            ClassifierError::Http(_) => true,
            ClassifierError::Api { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            ClassifierError::InvalidResponse(_) => false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifierPayload {
    Flat(Vec<ClassificationItem>),
    Nested(Vec<Vec<ClassificationItem>>),
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Client for a Hugging Face hosted image-classification model.
#[derive(Clone)]
pub struct HuggingFaceClassifier {
    http_client: HttpClient,
    api_token: String,
    model: String,
    endpoint: String,
}

impl HuggingFaceClassifier {
    pub fn new(http_client: HttpClient, config: &ClassifierConfig, api_token: String) -> Self {
        Self {
            http_client,
            api_token,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn model_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.model)
    }

    /// Sends the raw image bytes and returns the model's label/score list.
    pub async fn classify(
        &self,
        image: &ResolvedImage,
    ) -> Result<Vec<ClassificationItem>, ClassifierError> {
        let url = self.model_url();
        log::debug!(
            "Classifying {} bytes ({}) with {}",
            image.bytes.len(),
            image.mime_type,
            self.model
        );

        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .header(CONTENT_TYPE, image.mime_type.as_str())
            .body(image.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|err| err.error)
                .unwrap_or(body);
            return Err(ClassifierError::Api { status, message });
        }

        let items = match serde_json::from_str::<ClassifierPayload>(&body)
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?
        {
            ClassifierPayload::Flat(items) => items,
            ClassifierPayload::Nested(groups) => groups.into_iter().flatten().collect(),
        };

        if items.is_empty() {
            return Err(ClassifierError::InvalidResponse(
                "empty classification list".into(),
            ));
        }
        Ok(items)
    }
}
