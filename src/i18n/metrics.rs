//! Locale detection metrics.
//!
//! Counts which signal decided each resolution and how many locale
//! redirects were issued.

use crate::i18n::DetectionSource;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct DetectionMetrics {
    query: AtomicUsize,
    cookie: AtomicUsize,
    accept_language: AtomicUsize,
    geo: AtomicUsize,
    default: AtomicUsize,
    redirects: AtomicUsize,
}

impl DetectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the source of one resolution.
    pub fn record_resolution(&self, source: DetectionSource) {
        let counter = match source {
            DetectionSource::Query => &self.query,
            DetectionSource::Cookie => &self.cookie,
            DetectionSource::AcceptLanguage => &self.accept_language,
            DetectionSource::Geo => &self.geo,
            DetectionSource::Default => &self.default,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a locale redirect.
    pub fn record_redirect(&self) {
        self.redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resolutions(&self, source: DetectionSource) -> usize {
        match source {
            DetectionSource::Query => self.query.load(Ordering::Relaxed),
            DetectionSource::Cookie => self.cookie.load(Ordering::Relaxed),
            DetectionSource::AcceptLanguage => self.accept_language.load(Ordering::Relaxed),
            DetectionSource::Geo => self.geo.load(Ordering::Relaxed),
            DetectionSource::Default => self.default.load(Ordering::Relaxed),
        }
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let query = self.resolutions(DetectionSource::Query);
        let cookie = self.resolutions(DetectionSource::Cookie);
        let accept_language = self.resolutions(DetectionSource::AcceptLanguage);
        let geo = self.resolutions(DetectionSource::Geo);
        let default = self.resolutions(DetectionSource::Default);
        let total = query + cookie + accept_language + geo + default;

        // Share of resolutions that ended on the default because no signal
        // (including geo) produced a supported locale.
        let fallback_rate = if total > 0 {
            (default as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            query,
            cookie,
            accept_language,
            geo,
            default,
            total,
            fallback_rate,
            redirects: self.redirects(),
        }
    }
}

/// Snapshot of detection counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub query: usize,
    pub cookie: usize,
    pub accept_language: usize,
    pub geo: usize,
    pub default: usize,
    pub total: usize,

    /// Percentage (0-100) of resolutions that fell back to the default
    pub fallback_rate: f64,

    pub redirects: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_empty() {
        let report = DetectionMetrics::new().report();
        assert_eq!(report.total, 0);
        assert_eq!(report.fallback_rate, 0.0);
        assert_eq!(report.redirects, 0);
    }

    #[test]
    fn test_record_resolution_per_source() {
        let metrics = DetectionMetrics::new();
        metrics.record_resolution(DetectionSource::Query);
        metrics.record_resolution(DetectionSource::Query);
        metrics.record_resolution(DetectionSource::Geo);

        assert_eq!(metrics.resolutions(DetectionSource::Query), 2);
        assert_eq!(metrics.resolutions(DetectionSource::Geo), 1);
        assert_eq!(metrics.resolutions(DetectionSource::Cookie), 0);
    }

    #[test]
    fn test_report_fallback_rate() {
        let metrics = DetectionMetrics::new();
        // 1 default out of 4 = 25%
        metrics.record_resolution(DetectionSource::Default);
        metrics.record_resolution(DetectionSource::Cookie);
        metrics.record_resolution(DetectionSource::AcceptLanguage);
        metrics.record_resolution(DetectionSource::AcceptLanguage);
        metrics.record_redirect();

        let report = metrics.report();
        assert_eq!(report.total, 4);
        assert_eq!(report.accept_language, 2);
        assert_eq!(report.fallback_rate, 25.0);
        assert_eq!(report.redirects, 1);
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(DetectionMetrics::new().report()).unwrap();
        assert_eq!(json["accept_language"], 0);
        assert_eq!(json["redirects"], 0);
    }
}
