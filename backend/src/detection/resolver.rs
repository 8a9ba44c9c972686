use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::config::FetchConfig;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Fetch(String),
}

/// Image bytes plus the MIME type they were declared with.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Clone)]
pub struct ImageResolver {
    http_client: HttpClient,
    max_image_bytes: usize,
}

impl ImageResolver {
    pub fn new(http_client: HttpClient, config: &FetchConfig) -> Self {
        Self {
            http_client,
            max_image_bytes: config.max_image_bytes,
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Turns a data URL or an `http(s)` URL into image bytes.
    pub async fn resolve(&self, reference: &str) -> Result<ResolvedImage, ResolveError> {
        let reference = reference.trim();
        let image = if has_data_scheme(reference) {
            decode_data_url(reference)?
        } else {
            self.fetch_remote(reference).await?
        };
        self.check_size(image)
    }

    /// Accepts bytes that arrived in a multipart upload.
    pub fn from_upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<ResolvedImage, ResolveError> {
        let mime_type = media_type(mime_type);
        if !is_image_mime(&mime_type) {
            return Err(ResolveError::InvalidInput(format!(
                "Uploaded file is not an image (content type: {})",
                display_mime(&mime_type)
            )));
        }
        if bytes.is_empty() {
            return Err(ResolveError::InvalidInput("Uploaded file is empty".into()));
        }
        self.check_size(ResolvedImage { bytes, mime_type })
    }

    async fn fetch_remote(&self, reference: &str) -> Result<ResolvedImage, ResolveError> {
        let url = Url::parse(reference)
            .map_err(|e| ResolveError::InvalidInput(format!("Invalid image URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ResolveError::InvalidInput(format!(
                "Unsupported image URL scheme: {}",
                url.scheme()
            )));
        }

        log::debug!("Fetching remote image from {}", url);
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::Fetch(format!("Failed to fetch image: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Fetch(format!(
                "Failed to fetch image: HTTP {}",
                status
            )));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(media_type)
            .unwrap_or_default();
        if !is_image_mime(&mime_type) {
            return Err(ResolveError::InvalidInput(format!(
                "URL does not point to an image (content type: {})",
                display_mime(&mime_type)
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_image_bytes {
                return Err(self.too_large(length as usize));
            }
        }

        // Chunked bodies carry no length, so the cap is enforced while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ResolveError::Fetch(format!("Failed to read image body: {}", e)))?
        {
            if bytes.len() + chunk.len() > self.max_image_bytes {
                return Err(self.too_large(bytes.len() + chunk.len()));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(ResolvedImage { bytes, mime_type })
    }

    fn check_size(&self, image: ResolvedImage) -> Result<ResolvedImage, ResolveError> {
        if image.bytes.len() > self.max_image_bytes {
            return Err(self.too_large(image.bytes.len()));
        }
        Ok(image)
    }

    fn too_large(&self, size: usize) -> ResolveError {
        ResolveError::InvalidInput(format!(
            "Image is too large: {} bytes (limit {} bytes)",
            size, self.max_image_bytes
        ))
    }
}

/// Decodes `data:image/<type>;base64,<payload>`, splitting on the first comma.
pub fn decode_data_url(reference: &str) -> Result<ResolvedImage, ResolveError> {
    let rest = reference
        .get(..5)
        .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .map(|_| &reference[5..])
        .ok_or_else(|| ResolveError::InvalidInput("Not a data URL".into()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ResolveError::InvalidInput("Data URL is missing its payload".into()))?;

    let mut params = header.split(';');
    let mime_type = media_type(params.next().unwrap_or_default());
    if !is_image_mime(&mime_type) {
        return Err(ResolveError::InvalidInput(format!(
            "Data URL does not declare an image MIME type (found: {})",
            display_mime(&mime_type)
        )));
    }
    if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
        return Err(ResolveError::InvalidInput(
            "Data URL payload must be base64 encoded".into(),
        ));
    }

    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if payload.is_empty() {
        return Err(ResolveError::InvalidInput(
            "Data URL is missing its payload".into(),
        ));
    }

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| ResolveError::InvalidInput(format!("Invalid base64 payload: {}", e)))?;

    Ok(ResolvedImage { bytes, mime_type })
}

fn has_data_scheme(reference: &str) -> bool {
    reference
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// `image/png; charset=binary` -> `image/png`
fn media_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

fn display_mime(mime_type: &str) -> &str {
    if mime_type.is_empty() { "none" } else { mime_type }
}
