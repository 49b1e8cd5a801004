//! Request filters, applied in order: locale redirect, auth rate limit,
//! request guard.

use crate::cookies;
use crate::error::ApiError;
use crate::guard;
use crate::i18n::redirect::{is_locale_exempt, path_has_locale, LocaleRedirect, LOCALE_DETECTED_COOKIE};
use crate::i18n::preferences::DetectionRecord;
use crate::i18n::LocaleSignals;
use crate::rate_limit::{client_key, RateDecision};
use crate::server::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, warn};

/// Redirect requests without a locale prefix to the resolved locale.
pub async fn locale_filter(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_locale_exempt(&path) || path_has_locale(&path, &state.locales) {
        return next.run(request).await;
    }

    let (parts, _body) = request.into_parts();
    let signals = LocaleSignals::from_request_parts(&parts);
    let resolution = state.resolver.resolve(&signals).await;
    state.metrics.record_resolution(resolution.source);
    state.metrics.record_redirect();
    state.detections.record_detection(DetectionRecord {
        timestamp: Utc::now(),
        source: resolution.source,
        detected_locale: resolution.locale,
        location: None,
    });

    debug!(
        "Locale {} from {:?} for {}",
        resolution.locale, resolution.source, path
    );

    let marker_present = cookies::has(&parts.headers, LOCALE_DETECTED_COOKIE);
    LocaleRedirect::new(resolution.locale, &path, marker_present).into_response()
}

pub fn is_auth_path(path: &str) -> bool {
    path == "/api/auth" || path.starts_with("/api/auth/")
}

/// Limit requests to the authentication routes per client address.
pub async fn auth_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_auth_path(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(request.headers());
    match state.rate_limiter.check(&key, Instant::now()) {
        RateDecision::Allowed { remaining } => {
            debug!("Auth request from {} allowed, {} remaining", key, remaining);
            next.run(request).await
        }
        RateDecision::Limited { retry_after } => {
            warn!("Rate limit exceeded for {} on {}", key, request.uri().path());
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

/// Reject state-changing post requests that fail the content-type or
/// same-origin checks.
pub async fn request_guard(request: Request, next: Next) -> Response {
    if guard::applies_to(request.method(), request.uri().path()) {
        if let Err(rejection) = guard::check_request(request.method(), request.headers()) {
            warn!(
                "Rejected {} {}: {}",
                request.method(),
                request.uri().path(),
                rejection
            );
            return ApiError::from(rejection).into_response();
        }
    }
    next.run(request).await
}
