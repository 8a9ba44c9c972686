use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::{ErrorBody, ErrorKind};

use crate::detection::classifier::ClassifierError;
use crate::detection::resolver::ResolveError;

/// Request-level failure. `Display` is the raw message surfaced as `details`.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    MethodNotAllowed(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    Fetch(String),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

impl DetectError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectError::InvalidInput(_) => ErrorKind::InvalidInput,
            DetectError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            DetectError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            DetectError::Fetch(_) | DetectError::Classifier(_) => ErrorKind::Internal,
        }
    }
}

impl From<ResolveError> for DetectError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidInput(msg) => DetectError::InvalidInput(msg),
            ResolveError::Fetch(msg) => DetectError::Fetch(msg),
        }
    }
}

impl ResponseError for DetectError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::new(self.kind(), self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            DetectError::invalid_input("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DetectError::MethodNotAllowed("GET".into()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            DetectError::ServiceUnavailable("no token".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            DetectError::Fetch("404".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let classifier = ClassifierError::InvalidResponse("empty".into());
        assert_eq!(
            DetectError::from(classifier).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn resolver_errors_keep_their_category() {
        let err: DetectError = ResolveError::InvalidInput("not an image".into()).into();
        assert!(matches!(err, DetectError::InvalidInput(_)));

        let err: DetectError = ResolveError::Fetch("status 404".into()).into();
        assert!(matches!(err, DetectError::Fetch(_)));
        assert_eq!(err.to_string(), "status 404");
    }
}
