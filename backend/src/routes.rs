use actix_multipart::Multipart;
use actix_web::http::Method;
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::middleware::DefaultHeaders;
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use futures::{StreamExt, TryStreamExt};
use shared::{DetectRequest, DetectResponse, HealthResponse};
use uuid::Uuid;

use crate::detection::DetectionService;
use crate::detection::service::{Stage, enter};
use crate::detection::verdict::Verdict;
use crate::error::DetectError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// JSON bodies must fit a base64 data URL of the largest accepted image.
pub fn json_body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes.div_ceil(3) * 4 + 64 * 1024
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, max_image_bytes: usize) {
    let json_config = web::JsonConfig::default()
        .limit(json_body_limit(max_image_bytes))
        .error_handler(|err, _req| {
            DetectError::invalid_input(format!("Invalid JSON body: {}", err)).into()
        });

    cfg.app_data(json_config)
        .service(
            web::resource("/api/detect")
                .route(web::post().to(detect))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/api/detect/upload")
                .route(web::post().to(detect_upload))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        )
        .service(web::resource("/api/health").route(web::get().to(health)));
}

/// Permissive CORS headers attached to every response.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .add((header::ACCESS_CONTROL_MAX_AGE, "3600"))
}

async fn detect(
    service: web::Data<DetectionService>,
    body: web::Json<DetectRequest>,
) -> HttpResponse {
    let request_id = Uuid::new_v4();
    let result = service
        .detect_reference(request_id, body.image_url.as_deref())
        .await;
    respond(request_id, result)
}

async fn detect_upload(service: web::Data<DetectionService>, mut payload: Multipart) -> HttpResponse {
    let request_id = Uuid::new_v4();
    let result = process_upload(&service, request_id, &mut payload).await;
    respond(request_id, result)
}

async fn process_upload(
    service: &DetectionService,
    request_id: Uuid,
    payload: &mut Multipart,
) -> Result<Verdict, DetectError> {
    service.ensure_available()?;

    enter(request_id, Stage::ValidatingInput);
    let (image_data, mime_type) = read_upload(payload, service.max_upload_bytes()).await?;
    service.detect_upload(request_id, image_data, &mime_type).await
}

/// Reads the first part that carries a content type. Plain form fields are skipped.
async fn read_upload(
    payload: &mut Multipart,
    max_bytes: usize,
) -> Result<(Vec<u8>, String), DetectError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| DetectError::invalid_input(format!("Malformed multipart body: {}", e)))?
    {
        let Some(mime_type) = field.content_type().map(|mime| mime.essence_str().to_string())
        else {
            continue;
        };

        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| {
                DetectError::invalid_input(format!("Failed to read uploaded file: {}", e))
            })?;
            if image_data.len() + data.len() > max_bytes {
                return Err(DetectError::invalid_input(format!(
                    "Image is too large (limit {} bytes)",
                    max_bytes
                )));
            }
            image_data.extend_from_slice(&data);
        }
        return Ok((image_data, mime_type));
    }

    Err(DetectError::invalid_input("No image file found in upload"))
}

async fn preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

async fn method_not_allowed(req: HttpRequest) -> HttpResponse {
    let err = DetectError::MethodNotAllowed(format!(
        "Method {} is not allowed; use POST",
        req.method()
    ));
    let mut response = err.error_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("POST, OPTIONS"));
    response
}

async fn health(service: web::Data<DetectionService>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        classifier_configured: service.is_available(),
        model: service.model().to_string(),
    })
}

fn respond(request_id: Uuid, result: Result<Verdict, DetectError>) -> HttpResponse {
    let mut response = match result {
        Ok(verdict) => {
            enter(request_id, Stage::Responding);
            HttpResponse::Ok().json(DetectResponse::from(verdict))
        }
        Err(err) => {
            if err.status_code().is_server_error() {
                log::error!("[{}] detection failed: {}", request_id, err);
            } else {
                log::warn!("[{}] detection rejected: {}", request_id, err);
            }
            err.error_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}
