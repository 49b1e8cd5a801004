//! Locale resolution from request signals.
//!
//! Precedence is fixed: query override, stored preference cookie,
//! Accept-Language, geo-IP, then the default locale. Every signal is
//! optional and every failure degrades to the next one, so resolution
//! always produces a supported locale.

use crate::cookies;
use crate::i18n::accept_language;
use crate::i18n::{GeoLocator, Locale, LocaleRegistry};
use axum::http::{header, request::Parts, HeaderMap};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Query parameter that overrides every other signal.
pub const LOCALE_QUERY_PARAM: &str = "lang";

/// Cookie holding an explicitly chosen locale.
pub const PREFERRED_LOCALE_COOKIE: &str = "preferred-language";

/// Where a resolved locale came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionSource {
    Query,
    Cookie,
    AcceptLanguage,
    Geo,
    Default,
}

/// The raw locale evidence carried by one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleSignals {
    pub query_lang: Option<String>,
    pub preferred_cookie: Option<String>,
    pub accept_language: Option<String>,
    pub client_ip: Option<IpAddr>,
}

impl LocaleSignals {
    /// Extract signals from request parts. Unreadable values are treated
    /// as absent.
    pub fn from_request_parts(parts: &Parts) -> Self {
        let query_lang = parts.uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == LOCALE_QUERY_PARAM)
                .map(|(_, value)| value.into_owned())
        });

        Self {
            query_lang,
            preferred_cookie: cookies::get(&parts.headers, PREFERRED_LOCALE_COOKIE),
            accept_language: parts
                .headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            client_ip: forwarded_ip(&parts.headers),
        }
    }
}

/// First address of `X-Forwarded-For`, if it parses.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
}

/// Outcome of resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub locale: Locale,
    pub source: DetectionSource,
}

pub struct LocaleResolver {
    registry: Arc<LocaleRegistry>,
    geo: Arc<dyn GeoLocator>,
    geo_timeout: Duration,
}

impl LocaleResolver {
    pub fn new(registry: Arc<LocaleRegistry>, geo: Arc<dyn GeoLocator>, geo_timeout: Duration) -> Self {
        Self {
            registry,
            geo,
            geo_timeout,
        }
    }

    pub fn registry(&self) -> &LocaleRegistry {
        &self.registry
    }

    /// Resolve the locale for a request. Never fails.
    pub async fn resolve(&self, signals: &LocaleSignals) -> Resolution {
        if let Some(resolution) = self.resolve_local(signals) {
            return resolution;
        }

        if let Some(locale) = self.lookup_geo(signals.client_ip).await {
            return Resolution {
                locale,
                source: DetectionSource::Geo,
            };
        }

        Resolution {
            locale: self.registry.default_locale(),
            source: DetectionSource::Default,
        }
    }

    /// Resolve from the signals carried by the request itself, without
    /// touching the network.
    pub fn resolve_local(&self, signals: &LocaleSignals) -> Option<Resolution> {
        if let Some(locale) = signals
            .query_lang
            .as_deref()
            .and_then(|code| self.registry.parse(code))
        {
            return Some(Resolution {
                locale,
                source: DetectionSource::Query,
            });
        }

        if let Some(locale) = signals
            .preferred_cookie
            .as_deref()
            .and_then(|code| self.registry.parse(code))
        {
            return Some(Resolution {
                locale,
                source: DetectionSource::Cookie,
            });
        }

        let header = signals.accept_language.as_deref()?;
        match accept_language::negotiate(header, &self.registry) {
            Ok(locale) => {
                debug!("Accept-Language '{}' matched locale {}", header, locale);
                Some(Resolution {
                    locale,
                    source: DetectionSource::AcceptLanguage,
                })
            }
            Err(e) => {
                debug!("Ignoring Accept-Language header: {}", e);
                None
            }
        }
    }

    async fn lookup_geo(&self, ip: Option<IpAddr>) -> Option<Locale> {
        match tokio::time::timeout(self.geo_timeout, self.geo.lookup(ip)).await {
            Ok(Ok(info)) => {
                let locale = self.registry.parse(info.suggested_locale.code());
                if locale.is_none() {
                    debug!(
                        "Geo suggested unsupported locale {} for {}",
                        info.suggested_locale, info.country_code
                    );
                }
                locale
            }
            Ok(Err(e)) => {
                warn!("Geo lookup failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Geo lookup timed out after {:?}", self.geo_timeout);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{DisabledGeoLocator, GeoError, LocaleConfig, LocationInfo};
    use async_trait::async_trait;
    use axum::http::Request;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ==================== Helpers ====================

    struct FixedGeo {
        country: &'static str,
        calls: AtomicUsize,
    }

    impl FixedGeo {
        fn new(country: &'static str) -> Self {
            Self {
                country,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GeoLocator for FixedGeo {
        async fn lookup(&self, _ip: Option<IpAddr>) -> Result<LocationInfo, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LocationInfo {
                country: self.country.to_string(),
                country_code: self.country.to_string(),
                city: None,
                region: None,
                suggested_locale: crate::i18n::country_locale(self.country),
            })
        }
    }

    struct SlowGeo;

    #[async_trait]
    impl GeoLocator for SlowGeo {
        async fn lookup(&self, _ip: Option<IpAddr>) -> Result<LocationInfo, GeoError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(GeoError::MissingCountry)
        }
    }

    fn builtin_registry() -> Arc<LocaleRegistry> {
        Arc::new(LocaleRegistry::builtin().clone())
    }

    fn resolver_with(geo: Arc<dyn GeoLocator>) -> LocaleResolver {
        LocaleResolver::new(builtin_registry(), geo, Duration::from_millis(100))
    }

    fn offline_resolver() -> LocaleResolver {
        resolver_with(Arc::new(DisabledGeoLocator))
    }

    fn signals(query: Option<&str>, cookie: Option<&str>, header: Option<&str>) -> LocaleSignals {
        LocaleSignals {
            query_lang: query.map(str::to_string),
            preferred_cookie: cookie.map(str::to_string),
            accept_language: header.map(str::to_string),
            client_ip: None,
        }
    }

    // ==================== Signal Extraction Tests ====================

    #[test]
    fn test_signals_from_request_parts() {
        let (parts, _) = Request::builder()
            .uri("/posts/hello?foo=1&lang=zh")
            .header("cookie", "theme=dark; preferred-language=en")
            .header("accept-language", "en-GB,en;q=0.9")
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .body(())
            .unwrap()
            .into_parts();

        let signals = LocaleSignals::from_request_parts(&parts);
        assert_eq!(signals.query_lang.as_deref(), Some("zh"));
        assert_eq!(signals.preferred_cookie.as_deref(), Some("en"));
        assert_eq!(signals.accept_language.as_deref(), Some("en-GB,en;q=0.9"));
        assert_eq!(signals.client_ip, Some("198.51.100.4".parse().unwrap()));
    }

    #[test]
    fn test_signals_absent() {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        assert_eq!(LocaleSignals::from_request_parts(&parts), LocaleSignals::default());
    }

    #[test]
    fn test_forwarded_ip_garbage_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        assert_eq!(forwarded_ip(&headers), None);
    }

    // ==================== Precedence Tests ====================

    #[tokio::test]
    async fn test_query_wins_over_cookie() {
        let resolution = offline_resolver()
            .resolve(&signals(Some("zh"), Some("en"), Some("en")))
            .await;
        assert_eq!(resolution.locale, Locale::ZH);
        assert_eq!(resolution.source, DetectionSource::Query);
    }

    #[tokio::test]
    async fn test_unsupported_query_falls_to_cookie() {
        let resolution = offline_resolver()
            .resolve(&signals(Some("fr"), Some("zh"), Some("en")))
            .await;
        assert_eq!(resolution.locale, Locale::ZH);
        assert_eq!(resolution.source, DetectionSource::Cookie);
    }

    #[tokio::test]
    async fn test_cookie_wins_over_header() {
        let resolution = offline_resolver()
            .resolve(&signals(None, Some("en"), Some("zh-CN")))
            .await;
        assert_eq!(resolution.locale, Locale::EN);
        assert_eq!(resolution.source, DetectionSource::Cookie);
    }

    #[tokio::test]
    async fn test_header_region_normalisation() {
        let resolver = offline_resolver();
        let en = resolver.resolve(&signals(None, None, Some("en-GB"))).await;
        assert_eq!(en.locale, Locale::EN);
        assert_eq!(en.source, DetectionSource::AcceptLanguage);

        let zh = resolver.resolve(&signals(None, None, Some("zh-TW"))).await;
        assert_eq!(zh.locale, Locale::ZH);
    }

    #[tokio::test]
    async fn test_unmatched_header_uses_matcher_default_without_geo() {
        let geo = Arc::new(FixedGeo::new("CN"));
        let resolver = resolver_with(geo.clone());
        let resolution = resolver.resolve(&signals(None, None, Some("ja"))).await;
        assert_eq!(resolution.locale, Locale::EN);
        assert_eq!(resolution.source, DetectionSource::AcceptLanguage);
        assert_eq!(geo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_header_falls_to_geo() {
        let geo = Arc::new(FixedGeo::new("TW"));
        let resolution = resolver_with(geo)
            .resolve(&signals(None, None, Some("???")))
            .await;
        assert_eq!(resolution.locale, Locale::ZH);
        assert_eq!(resolution.source, DetectionSource::Geo);
    }

    #[tokio::test]
    async fn test_geo_used_when_no_local_signal() {
        let geo = Arc::new(FixedGeo::new("SG"));
        let resolution = resolver_with(geo.clone()).resolve(&LocaleSignals::default()).await;
        assert_eq!(resolution.locale, Locale::ZH);
        assert_eq!(resolution.source, DetectionSource::Geo);
        assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_signals_and_failed_geo_is_default() {
        let resolution = offline_resolver().resolve(&LocaleSignals::default()).await;
        assert_eq!(resolution.locale, Locale::EN);
        assert_eq!(resolution.source, DetectionSource::Default);
    }

    #[tokio::test]
    async fn test_slow_geo_times_out_to_default() {
        let resolution = resolver_with(Arc::new(SlowGeo))
            .resolve(&LocaleSignals::default())
            .await;
        assert_eq!(resolution.source, DetectionSource::Default);
    }

    #[tokio::test]
    async fn test_geo_locale_outside_registry_is_ignored() {
        let registry = LocaleRegistry::new(vec![
            LocaleConfig {
                code: "en",
                name: "English",
                native_name: "English",
                is_default: false,
            },
            LocaleConfig {
                code: "fr",
                name: "French",
                native_name: "Français",
                is_default: true,
            },
        ])
        .unwrap();
        let resolver = LocaleResolver::new(
            Arc::new(registry),
            Arc::new(FixedGeo::new("CN")),
            Duration::from_millis(100),
        );
        let resolution = resolver.resolve(&LocaleSignals::default()).await;
        assert_eq!(resolution.locale.code(), "fr");
        assert_eq!(resolution.source, DetectionSource::Default);
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_supported_query_always_wins(
            lang in prop::sample::select(vec!["en", "zh"]),
            cookie in prop::option::of("[a-z]{2}"),
            header in prop::option::of("[a-zA-Z-]{1,10}"),
        ) {
            let resolver = offline_resolver();
            let resolution = resolver
                .resolve_local(&signals(Some(lang), cookie.as_deref(), header.as_deref()))
                .unwrap();
            prop_assert_eq!(resolution.locale.code(), lang);
            prop_assert_eq!(resolution.source, DetectionSource::Query);
        }

        #[test]
        fn prop_resolution_is_always_supported(
            query in prop::option::of("[a-zA-Z-]{0,6}"),
            cookie in prop::option::of("[a-zA-Z-]{0,6}"),
            header in prop::option::of("[a-zA-Z,;=.0-9 -]{0,24}"),
        ) {
            let resolver = offline_resolver();
            let resolution = tokio_test::block_on(
                resolver.resolve(&signals(query.as_deref(), cookie.as_deref(), header.as_deref())),
            );
            prop_assert!(LocaleRegistry::builtin().is_supported(resolution.locale.code()));
        }
    }
}
