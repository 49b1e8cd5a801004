//! Accept-Language parsing and best-fit matching.

use crate::i18n::{Locale, LocaleRegistry};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum AcceptLanguageError {
    #[error("Accept-Language header is empty")]
    Empty,

    #[error("Invalid language tag: '{0}'")]
    InvalidTag(String),

    #[error("Invalid quality value for '{tag}': '{value}'")]
    InvalidQuality { tag: String, value: String },
}

/// A single entry of an Accept-Language header.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageRange {
    pub tag: String,
    pub quality: f32,
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\*|[A-Za-z]{1,8}(-[A-Za-z0-9]{1,8})*)$").expect("static regex is valid")
    })
}

/// Parse an Accept-Language header into ranges ordered by preference.
///
/// Malformed entries are skipped; the header is only rejected when no
/// well-formed entry remains. Entries with `q=0` are dropped. Ranges with
/// equal quality keep their header order.
pub fn parse_accept_language(header: &str) -> Result<Vec<LanguageRange>, AcceptLanguageError> {
    if header.trim().is_empty() {
        return Err(AcceptLanguageError::Empty);
    }

    let mut ranges = Vec::new();
    let mut valid_entries = 0;
    let mut first_error = None;
    for entry in header.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        match parse_entry(entry) {
            Ok(range) => {
                valid_entries += 1;
                if range.quality > 0.0 {
                    ranges.push(range);
                }
            }
            Err(e) => {
                debug!("Skipping Accept-Language entry '{}': {}", entry, e);
                first_error.get_or_insert(e);
            }
        }
    }

    if valid_entries == 0 {
        return Err(first_error.unwrap_or(AcceptLanguageError::Empty));
    }

    // Stable sort keeps header order for ties.
    ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    Ok(ranges)
}

fn parse_entry(entry: &str) -> Result<LanguageRange, AcceptLanguageError> {
    let mut parts = entry.split(';');
    let tag = parts.next().unwrap_or_default().trim();
    if !tag_pattern().is_match(tag) {
        return Err(AcceptLanguageError::InvalidTag(tag.to_string()));
    }

    let mut quality = 1.0_f32;
    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("q") {
            let value = value.trim();
            quality = value
                .parse::<f32>()
                .ok()
                .filter(|q| (0.0..=1.0).contains(q))
                .ok_or_else(|| AcceptLanguageError::InvalidQuality {
                    tag: tag.to_string(),
                    value: value.to_string(),
                })?;
        }
    }

    Ok(LanguageRange {
        tag: tag.to_string(),
        quality,
    })
}

/// Collapse regional variants onto the site's locales.
///
/// `zh-CN`, `zh-TW`, ... become `zh`; `en-US`, `en-GB`, ... become `en`.
/// Everything else passes through unchanged.
pub fn normalize_tag(tag: &str) -> String {
    let lower = tag.to_ascii_lowercase();
    if lower.starts_with("zh-") {
        "zh".to_string()
    } else if lower.starts_with("en-") {
        "en".to_string()
    } else {
        tag.to_string()
    }
}

/// Best-fit match of requested tags against the registry.
///
/// For each requested tag in order: an exact match wins, then a match on
/// the primary subtag, and `*` selects the default. When nothing matches
/// the default locale is returned.
pub fn match_locale(requested: &[String], registry: &LocaleRegistry) -> Locale {
    for tag in requested {
        if tag == "*" {
            return registry.default_locale();
        }
        if let Some(locale) = registry.parse(tag) {
            return locale;
        }
        let primary = tag.split('-').next().unwrap_or_default();
        if let Some(locale) = registry.parse(primary) {
            return locale;
        }
    }
    registry.default_locale()
}

/// Parse, normalise and match an Accept-Language header in one step.
///
/// Returns an error when the header is empty, has no well-formed entry,
/// or every entry was weighted `q=0`, so the caller can fall through to
/// the next signal.
pub fn negotiate(header: &str, registry: &LocaleRegistry) -> Result<Locale, AcceptLanguageError> {
    let ranges = parse_accept_language(header)?;
    if ranges.is_empty() {
        return Err(AcceptLanguageError::Empty);
    }
    let normalized: Vec<String> = ranges.iter().map(|r| normalize_tag(&r.tag)).collect();
    Ok(match_locale(&normalized, registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_orders_by_quality() {
        let ranges = parse_accept_language("fr;q=0.5, zh-CN, en;q=0.8").unwrap();
        let tags: Vec<_> = ranges.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["zh-CN", "en", "fr"]);
        assert_eq!(ranges[0].quality, 1.0);
    }

    #[test]
    fn test_parse_keeps_header_order_for_ties() {
        let ranges = parse_accept_language("de, zh, en").unwrap();
        let tags: Vec<_> = ranges.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["de", "zh", "en"]);
    }

    #[test]
    fn test_parse_drops_zero_quality() {
        let ranges = parse_accept_language("zh;q=0, en").unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].tag, "en");
    }

    #[test]
    fn test_parse_empty_header() {
        assert_eq!(parse_accept_language("  "), Err(AcceptLanguageError::Empty));
    }

    #[test]
    fn test_parse_invalid_tag() {
        let err = parse_accept_language("<script>").unwrap_err();
        assert!(matches!(err, AcceptLanguageError::InvalidTag(_)));
    }

    #[test]
    fn test_parse_invalid_quality() {
        let err = parse_accept_language("en;q=abc").unwrap_err();
        assert!(matches!(err, AcceptLanguageError::InvalidQuality { .. }));
        assert!(parse_accept_language("en;q=1.5").is_err());
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let ranges = parse_accept_language("zh-CN,zh;q=0.9,en_US;q=0.5").unwrap();
        let tags: Vec<_> = ranges.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["zh-CN", "zh"]);

        let ranges = parse_accept_language("en;q=2, <script>, zh;q=0.3").unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].tag, "zh");
    }

    // ==================== Normalisation Tests ====================

    #[test]
    fn test_normalize_region_subtags() {
        assert_eq!(normalize_tag("zh-TW"), "zh");
        assert_eq!(normalize_tag("zh-Hans-CN"), "zh");
        assert_eq!(normalize_tag("en-GB"), "en");
        assert_eq!(normalize_tag("EN-us"), "en");
        assert_eq!(normalize_tag("fr-CA"), "fr-CA");
        assert_eq!(normalize_tag("en"), "en");
    }

    // ==================== Matching Tests ====================

    #[test]
    fn test_match_first_supported_wins() {
        let registry = LocaleRegistry::builtin();
        let requested = vec!["fr".to_string(), "zh".to_string(), "en".to_string()];
        assert_eq!(match_locale(&requested, registry), Locale::ZH);
    }

    #[test]
    fn test_match_primary_subtag() {
        let registry = LocaleRegistry::builtin();
        assert_eq!(match_locale(&["ZH-hant".to_string()], registry), Locale::ZH);
    }

    #[test]
    fn test_match_falls_back_to_default() {
        let registry = LocaleRegistry::builtin();
        assert_eq!(match_locale(&["ja".to_string()], registry), Locale::EN);
        assert_eq!(match_locale(&[], registry), Locale::EN);
    }

    #[test]
    fn test_match_wildcard_is_default() {
        let registry = LocaleRegistry::builtin();
        let requested = vec!["*".to_string(), "zh".to_string()];
        assert_eq!(match_locale(&requested, registry), Locale::EN);
    }

    #[test]
    fn test_negotiate_regional_variants() {
        let registry = LocaleRegistry::builtin();
        assert_eq!(negotiate("en-GB", registry), Ok(Locale::EN));
        assert_eq!(negotiate("zh-TW,en;q=0.9", registry), Ok(Locale::ZH));
    }

    #[test]
    fn test_negotiate_ignores_one_bad_entry() {
        let registry = LocaleRegistry::builtin();
        assert_eq!(negotiate("zh-CN,zh;q=0.9,en_US;q=0.5", registry), Ok(Locale::ZH));
    }

    #[test]
    fn test_negotiate_all_zero_quality_is_error() {
        let registry = LocaleRegistry::builtin();
        assert_eq!(negotiate("zh;q=0", registry), Err(AcceptLanguageError::Empty));
    }
}
