//! Content-type and same-origin checks for state-changing API requests.

use axum::http::{header, HeaderMap, Method, StatusCode};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardRejection {
    #[error("Invalid Content-Type. Expected application/json.")]
    UnsupportedMediaType,

    #[error("Missing Host header")]
    MissingHost,

    #[error("Missing Origin or Referer header")]
    MissingOrigin,

    #[error("Invalid Origin")]
    InvalidOrigin,

    #[error("Invalid Referer")]
    InvalidReferer,
}

impl GuardRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardRejection::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GuardRejection::MissingHost => StatusCode::BAD_REQUEST,
            GuardRejection::MissingOrigin
            | GuardRejection::InvalidOrigin
            | GuardRejection::InvalidReferer => StatusCode::FORBIDDEN,
        }
    }
}

pub fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Whether a request falls under the guard: state-changing methods on the
/// posts API.
pub fn applies_to(method: &Method, path: &str) -> bool {
    is_state_changing(method) && (path == "/api/posts" || path.starts_with("/api/posts/"))
}

/// Validate a state-changing request. Checks run in order: content type,
/// host, then origin (or referer when no origin is sent).
pub fn check_request(method: &Method, headers: &HeaderMap) -> Result<(), GuardRejection> {
    if !is_state_changing(method) {
        return Ok(());
    }

    let content_type = header_str(headers, header::CONTENT_TYPE.as_str());
    if !content_type.is_some_and(|value| value.contains("application/json")) {
        return Err(GuardRejection::UnsupportedMediaType);
    }

    let host = header_str(headers, header::HOST.as_str()).ok_or(GuardRejection::MissingHost)?;

    match (
        header_str(headers, header::ORIGIN.as_str()),
        header_str(headers, header::REFERER.as_str()),
    ) {
        (Some(origin), _) => {
            if url_host(origin).as_deref() == Some(host) {
                Ok(())
            } else {
                Err(GuardRejection::InvalidOrigin)
            }
        }
        (None, Some(referer)) => {
            if url_host(referer).as_deref() == Some(host) {
                Ok(())
            } else {
                Err(GuardRejection::InvalidReferer)
            }
        }
        (None, None) => Err(GuardRejection::MissingOrigin),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// `host[:port]` of a URL, with the port only when it is not the scheme's
/// default.
fn url_host(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
