//! HTTP-facing errors. Every variant renders as `{"error": "<message>"}`.

use crate::content::ContentError;
use crate::guard::GuardRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, please try again later.")]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Guard(#[from] GuardRejection),

    #[error("Internal server error")]
    Content(#[from] ContentError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Guard(rejection) => rejection.status(),
            ApiError::Content(ContentError::InvalidSlug(_)) => StatusCode::BAD_REQUEST,
            ApiError::Content(ContentError::ReadOnly) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Content(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Content(e @ (ContentError::InvalidSlug(_) | ContentError::ReadOnly)) => {
                e.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Content(e) = &self {
            error!("Content store error: {}", e);
        }

        let status = self.status();
        let mut response = (status, Json(json!({ "error": self.message() }))).into_response();

        if let ApiError::RateLimited { retry_after } = self {
            // Rounded up to whole seconds.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(GuardRejection::InvalidOrigin).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ContentError::InvalidSlug("../x".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited {
            retry_after: Duration::from_millis(12_300),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "13");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let error = ApiError::from(ContentError::Io {
            path: "/srv/posts".into(),
            source: std::io::Error::other("disk on fire"),
        });
        assert_eq!(error.message(), "Internal server error");
    }
}
