use reqwest::Client as HttpClient;
use std::fmt;
use uuid::Uuid;

use super::classifier::HuggingFaceClassifier;
use super::resolver::{ImageResolver, ResolvedImage};
use super::retry::RetryPolicy;
use super::verdict::{Verdict, VerdictMapper};
use crate::config::{DetectorConfig, TOKEN_ENV};
use crate::error::DetectError;

/// Request lifecycle, used to tag log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidatingInput,
    ResolvingImage,
    Classifying,
    MappingVerdict,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ValidatingInput => "validating input",
            Stage::ResolvingImage => "resolving image",
            Stage::Classifying => "classifying",
            Stage::MappingVerdict => "mapping verdict",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

pub fn enter(request_id: Uuid, stage: Stage) {
    log::debug!("[{}] {}", request_id, stage);
}

/// Built once at startup and shared read-only by every request.
pub struct DetectionService {
    resolver: ImageResolver,
    classifier: Option<HuggingFaceClassifier>,
    mapper: VerdictMapper,
    retry: RetryPolicy,
    model: String,
}

impl DetectionService {
    pub fn new(config: &DetectorConfig, api_token: Option<String>) -> Self {
        let http_client = HttpClient::new();

        let classifier = match api_token {
            Some(token) => Some(HuggingFaceClassifier::new(
                http_client.clone(),
                &config.classifier,
                token,
            )),
            None => {
                log::warn!(
                    "{} is not set; detection requests will return 503",
                    TOKEN_ENV
                );
                None
            }
        };

        Self {
            resolver: ImageResolver::new(http_client, &config.fetch),
            classifier,
            mapper: VerdictMapper::new(&config.verdict),
            retry: RetryPolicy::from_config(&config.retry),
            model: config.classifier.model.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn classifier(&self) -> Result<&HuggingFaceClassifier, DetectError> {
        self.classifier.as_ref().ok_or_else(|| {
            DetectError::ServiceUnavailable(format!(
                "Image classifier is not configured: {} is not set",
                TOKEN_ENV
            ))
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.resolver.max_image_bytes()
    }

    pub fn ensure_available(&self) -> Result<(), DetectError> {
        self.classifier().map(|_| ())
    }

    /// Full pipeline for a JSON request carrying a URL or data URL.
    pub async fn detect_reference(
        &self,
        request_id: Uuid,
        reference: Option<&str>,
    ) -> Result<Verdict, DetectError> {
        let classifier = self.classifier()?;

        enter(request_id, Stage::ValidatingInput);
        let reference = reference
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
            .ok_or_else(|| DetectError::invalid_input("Missing imageUrl in request body"))?;

        enter(request_id, Stage::ResolvingImage);
        let image = self.resolver.resolve(reference).await?;

        self.classify_and_map(request_id, classifier, &image).await
    }

    /// Pipeline for bytes received as a multipart upload.
    pub async fn detect_upload(
        &self,
        request_id: Uuid,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<Verdict, DetectError> {
        let classifier = self.classifier()?;

        enter(request_id, Stage::ResolvingImage);
        let image = self.resolver.from_upload(bytes, mime_type)?;

        self.classify_and_map(request_id, classifier, &image).await
    }

    async fn classify_and_map(
        &self,
        request_id: Uuid,
        classifier: &HuggingFaceClassifier,
        image: &ResolvedImage,
    ) -> Result<Verdict, DetectError> {
        enter(request_id, Stage::Classifying);
        let items = self
            .retry
            .run(|_| classifier.classify(image), tokio::time::sleep)
            .await?;

        enter(request_id, Stage::MappingVerdict);
        let verdict = self.mapper.map(&items);
        log::info!(
            "[{}] verdict: ai_generated={} confidence={:.2}",
            request_id,
            verdict.is_ai_generated,
            verdict.confidence
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierConfig, RetryConfig};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn config(server: &MockServer) -> DetectorConfig {
        DetectorConfig {
            classifier: ClassifierConfig {
                model: "acme/detector".into(),
                endpoint: format!("{}/models", server.uri()),
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_delay_ms: 1,
            },
            ..DetectorConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_credential_is_unavailable_without_network() {
        let server = MockServer::start().await;
        let service = DetectionService::new(&config(&server), None);

        let err = service
            .detect_reference(Uuid::new_v4(), Some(&format!("{}/cat.png", server.uri())))
            .await
            .unwrap_err();

        assert!(matches!(err, DetectError::ServiceUnavailable(_)));
        assert!(!service.is_available());
        let received = server.received_requests().await.unwrap_or_default();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn missing_reference_is_invalid_input() {
        let server = MockServer::start().await;
        let service = DetectionService::new(&config(&server), Some("token".into()));

        for reference in [None, Some(""), Some("   ")] {
            let err = service
                .detect_reference(Uuid::new_v4(), reference)
                .await
                .unwrap_err();
            assert!(matches!(err, DetectError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn transient_classifier_failures_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/acme/detector"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/acme/detector"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"label": "synthetic", "score": 0.9}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service = DetectionService::new(&config(&server), Some("token".into()));
        let verdict = service
            .detect_reference(Uuid::new_v4(), Some(PNG_DATA_URL))
            .await
            .unwrap();

        assert!(verdict.is_ai_generated);
        assert!((verdict.confidence - 90.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_classifier_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let service = DetectionService::new(&config(&server), Some("token".into()));
        let err = service
            .detect_reference(Uuid::new_v4(), Some(PNG_DATA_URL))
            .await
            .unwrap_err();

        assert!(matches!(err, DetectError::Classifier(_)));
    }

    #[tokio::test]
    async fn uploads_share_the_pipeline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"label": "cat", "score": 0.3}])),
            )
            .mount(&server)
            .await;

        let service = DetectionService::new(&config(&server), Some("token".into()));
        let verdict = service
            .detect_upload(Uuid::new_v4(), vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        assert!(!verdict.is_ai_generated);

        let err = service
            .detect_upload(Uuid::new_v4(), vec![1, 2, 3], "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::InvalidInput(_)));
    }

    #[test]
    fn stages_render_readably() {
        assert_eq!(Stage::ResolvingImage.to_string(), "resolving image");
        assert_eq!(Stage::Responding.to_string(), "responding");
    }
}
