//! Locale-prefix redirect policy.
//!
//! A URL carries its locale as the first path segment. Requests without one
//! are redirected to the resolved locale; requests with one are left alone,
//! whatever the other signals say.

use crate::cookies::{SameSite, SetCookie};
use crate::i18n::{Locale, LocaleRegistry};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;

/// Marker cookie set on the first redirect a client receives.
pub const LOCALE_DETECTED_COOKIE: &str = "geo-language-detected";

const LOCALE_DETECTED_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24);

/// True if `path` is `/L` or starts with `/L/` for a supported locale `L`.
pub fn path_has_locale(path: &str, registry: &LocaleRegistry) -> bool {
    registry.locales().any(|locale| {
        let prefix = locale.path_prefix();
        path == prefix
            || path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Locale carried by the path, if any.
pub fn path_locale(path: &str, registry: &LocaleRegistry) -> Option<Locale> {
    let first = path.trim_start_matches('/').split('/').next()?;
    registry
        .locales()
        .find(|locale| locale.code() == first)
}

/// Paths the locale filter never touches: API routes, static assets,
/// the health probe and anything that looks like a file.
pub fn is_locale_exempt(path: &str) -> bool {
    let under = |prefix: &str| path == prefix || path.starts_with(&format!("{}/", prefix));
    under("/api")
        || under("/static")
        || path == "/health"
        || path.rsplit('/').next().is_some_and(|last| last.contains('.'))
}

/// The locale-prefixed location for `path`. The root path keeps its
/// slash, so `/` becomes `/en/`.
pub fn redirect_target(locale: Locale, path: &str) -> String {
    if path.starts_with('/') {
        format!("{}{}", locale.path_prefix(), path)
    } else {
        format!("{}/{}", locale.path_prefix(), path)
    }
}

/// A redirect to a locale-prefixed path.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleRedirect {
    pub location: String,
    pub set_detected_marker: bool,
}

impl LocaleRedirect {
    pub fn new(locale: Locale, path: &str, marker_present: bool) -> Self {
        Self {
            location: redirect_target(locale, path),
            set_detected_marker: !marker_present,
        }
    }
}

impl IntoResponse for LocaleRedirect {
    fn into_response(self) -> Response {
        let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
        let headers = response.headers_mut();

        if let Ok(location) = HeaderValue::from_str(&self.location) {
            headers.insert(header::LOCATION, location);
        }
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        headers.insert("surrogate-control", HeaderValue::from_static("no-store"));

        if self.set_detected_marker {
            let cookie = SetCookie::new(LOCALE_DETECTED_COOKIE, "true")
                .max_age(LOCALE_DETECTED_MAX_AGE)
                .path("/")
                .http_only()
                .same_site(SameSite::Lax);
            if let Ok(value) = HeaderValue::from_str(&cookie.to_header_value()) {
                headers.append(header::SET_COOKIE, value);
            }
        }

        response
    }
}
