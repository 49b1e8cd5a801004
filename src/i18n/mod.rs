//! Internationalization (i18n) module: locale configuration and detection.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for the supported locales and the default
//! - `locale`: Validated `Locale` type
//! - `strings`: Localized UI strings
//! - `accept_language`: Accept-Language parsing and best-fit matching
//! - `geo`: Geo-IP lookup and the country-to-locale table
//! - `resolver`: Per-request locale resolution with fixed signal precedence
//! - `redirect`: Locale-prefix redirect policy
//! - `preferences`: Explicit preference, detection history and dismissed suggestions
//! - `metrics`: Detection counters
//!
//! # Example
//!
//! ```rust,ignore
//! use quicksilver_blog::i18n::{LocaleRegistry, LocaleResolver, LocaleSignals};
//!
//! let resolver = LocaleResolver::new(registry, geo, Duration::from_secs(2));
//! let resolution = resolver.resolve(&LocaleSignals::from_request_parts(&parts)).await;
//! ```

pub mod accept_language;
mod geo;
mod locale;
mod metrics;
pub mod preferences;
pub mod redirect;
mod registry;
mod resolver;
mod strings;

pub use accept_language::AcceptLanguageError;
pub use geo::{country_locale, DisabledGeoLocator, GeoError, GeoLocator, IpApiLocator, LocationInfo};
pub use locale::Locale;
pub use metrics::{DetectionMetrics, MetricsReport};
pub use registry::{LocaleConfig, LocaleRegistry};
pub use resolver::{
    forwarded_ip, DetectionSource, LocaleResolver, LocaleSignals, Resolution, LOCALE_QUERY_PARAM,
    PREFERRED_LOCALE_COOKIE,
};
pub use strings::LocaleStrings;
