//! Minimal Cookie / Set-Cookie handling for the locale cookies.

use axum::http::{header, HeaderMap};
use std::time::Duration;

/// Read a cookie value from the request headers.
///
/// All `Cookie` headers are searched; the first matching name wins.
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

/// Check whether a cookie is present at all.
pub fn has(headers: &HeaderMap, name: &str) -> bool {
    get(headers, name).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
}

/// A `Set-Cookie` value under construction.
#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    max_age: Option<Duration>,
    path: Option<String>,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: None,
            http_only: false,
            same_site: None,
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        if let Some(path) = &self.path {
            out.push_str(&format!("; Path={}", path));
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        match self.same_site {
            Some(SameSite::Lax) => out.push_str("; SameSite=Lax"),
            Some(SameSite::Strict) => out.push_str("; SameSite=Strict"),
            None => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "a=1; preferred-language=zh; b=2".parse().unwrap());
        assert_eq!(get(&headers, "preferred-language").as_deref(), Some("zh"));
        assert_eq!(get(&headers, "b").as_deref(), Some("2"));
        assert_eq!(get(&headers, "missing"), None);
    }

    #[test]
    fn test_get_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, "a=1".parse().unwrap());
        headers.append(header::COOKIE, "geo-language-detected=true".parse().unwrap());
        assert!(has(&headers, "geo-language-detected"));
    }

    #[test]
    fn test_get_ignores_malformed_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "garbage; lang=\"en\"".parse().unwrap());
        assert_eq!(get(&headers, "lang").as_deref(), Some("en"));
        assert!(!has(&headers, "garbage"));
    }

    #[test]
    fn test_set_cookie_rendering() {
        let cookie = SetCookie::new("geo-language-detected", "true")
            .max_age(Duration::from_secs(86_400))
            .http_only()
            .same_site(SameSite::Lax)
            .path("/");
        assert_eq!(
            cookie.to_header_value(),
            "geo-language-detected=true; Max-Age=86400; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_set_cookie_minimal() {
        assert_eq!(SetCookie::new("a", "b").to_header_value(), "a=b");
    }
}
