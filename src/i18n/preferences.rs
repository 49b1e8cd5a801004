//! Locale preference bookkeeping.
//!
//! Records an explicitly chosen locale, a short history of detection events
//! and the locale suggestions a visitor dismissed. None of this takes part in
//! resolution beyond the preference cookie it produces.

use crate::cookies::{SameSite, SetCookie};
use crate::i18n::{DetectionSource, Locale, LocaleRegistry, PREFERRED_LOCALE_COOKIE};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

const DETECTION_HISTORY_KEY: &str = "language-detection-sources";
const DISMISSED_SUGGESTIONS_KEY: &str = "dismissed-language-suggestions";

/// Maximum number of detection events kept.
pub const MAX_DETECTION_HISTORY: usize = 10;

/// Age after which history entries and dismissals are dropped.
pub fn retention() -> Duration {
    Duration::days(30)
}

const PREFERENCE_COOKIE_MAX_AGE: std::time::Duration =
    std::time::Duration::from_secs(60 * 60 * 24 * 365);

/// String key/value storage (browser local storage or an equivalent).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("preference store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("preference store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Coarse location attached to a geo detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub country: String,
    pub country_code: String,
    pub city: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: DateTime<Utc>,
    pub source: DetectionSource,
    pub detected_locale: Locale,
    pub location: Option<LocationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DismissedSuggestion {
    pub locale: Locale,
    pub timestamp: DateTime<Utc>,
}

pub struct PreferenceStore<S: KeyValueStore> {
    store: S,
    registry: &'static LocaleRegistry,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: LocaleRegistry::builtin(),
        }
    }

    /// Persist an explicit choice. Returns the `Set-Cookie` value carrying
    /// the same choice for the server-side resolver.
    pub fn save_preferred(&self, locale: Locale) -> String {
        if let Err(e) = self.store.set(PREFERRED_LOCALE_COOKIE, locale.code()) {
            warn!("Failed to store preferred locale: {}", e);
        }
        preference_cookie(locale)
    }

    /// The stored preference: the cookie value first, then local storage.
    /// Unsupported values are ignored.
    pub fn preferred(&self, cookie_value: Option<&str>) -> Option<Locale> {
        if let Some(locale) = cookie_value.and_then(|code| self.registry.parse(code)) {
            return Some(locale);
        }
        match self.store.get(PREFERRED_LOCALE_COOKIE) {
            Ok(stored) => stored.and_then(|code| self.registry.parse(&code)),
            Err(e) => {
                warn!("Failed to read preferred locale: {}", e);
                None
            }
        }
    }

    /// Prepend a detection event, keeping the most recent entries only.
    pub fn record_detection(&self, record: DetectionRecord) {
        let mut history = self.detection_history();
        history.insert(0, record);
        history.truncate(MAX_DETECTION_HISTORY);
        self.write_json(DETECTION_HISTORY_KEY, &history);
    }

    pub fn detection_history(&self) -> Vec<DetectionRecord> {
        self.read_json(DETECTION_HISTORY_KEY)
    }

    /// Remember that the visitor dismissed a suggestion for `locale`.
    pub fn dismiss_suggestion(&self, locale: Locale, now: DateTime<Utc>) {
        let mut dismissed = self.dismissed_suggestions(now);
        match dismissed.iter_mut().find(|item| item.locale == locale) {
            Some(existing) => existing.timestamp = now,
            None => dismissed.push(DismissedSuggestion {
                locale,
                timestamp: now,
            }),
        }
        self.write_json(DISMISSED_SUGGESTIONS_KEY, &dismissed);
    }

    /// Dismissals younger than the retention period.
    pub fn dismissed_suggestions(&self, now: DateTime<Utc>) -> Vec<DismissedSuggestion> {
        let cutoff = now - retention();
        self.read_json::<DismissedSuggestion>(DISMISSED_SUGGESTIONS_KEY)
            .into_iter()
            .filter(|item| item.timestamp > cutoff)
            .collect()
    }

    pub fn is_suggestion_dismissed(&self, locale: Locale, now: DateTime<Utc>) -> bool {
        self.dismissed_suggestions(now)
            .iter()
            .any(|item| item.locale == locale)
    }

    /// Drop history entries and dismissals older than the retention period.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) {
        let cutoff = now - retention();
        let history: Vec<DetectionRecord> = self
            .detection_history()
            .into_iter()
            .filter(|item| item.timestamp > cutoff)
            .collect();
        self.write_json(DETECTION_HISTORY_KEY, &history);

        let dismissed = self.dismissed_suggestions(now);
        self.write_json(DISMISSED_SUGGESTIONS_KEY, &dismissed);
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read '{}': {}", key, e);
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Discarding unreadable '{}': {}", key, e);
            Vec::new()
        })
    }

    fn write_json<T: Serialize>(&self, key: &str, items: &[T]) {
        let result = serde_json::to_string(items)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(key, &json));
        if let Err(e) = result {
            warn!("Failed to write '{}': {}", key, e);
        }
    }
}

/// Long-lived `Set-Cookie` value for an explicit locale choice.
pub fn preference_cookie(locale: Locale) -> String {
    SetCookie::new(PREFERRED_LOCALE_COOKIE, locale.code())
        .max_age(PREFERENCE_COOKIE_MAX_AGE)
        .path("/")
        .same_site(SameSite::Lax)
        .to_header_value()
}
