//! Locale registry: single source of truth for the locales the site serves.
//!
//! The built-in set is initialised once with `OnceLock` and never mutated.
//! Custom registries can be built for tests or alternative deployments,
//! but they are equally immutable once constructed.

use crate::i18n::Locale;
use anyhow::{bail, Result};
use std::sync::OnceLock;

/// Configuration for a supported locale.
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    /// Short locale code used as the URL prefix (e.g. "en", "zh")
    pub code: &'static str,

    /// English name of the locale (e.g. "English", "Chinese")
    pub name: &'static str,

    /// Native name of the locale (e.g. "English", "中文")
    pub native_name: &'static str,

    /// Whether this is the fallback locale (exactly one must be true)
    pub is_default: bool,
}

/// Ordered set of supported locales with one designated default.
#[derive(Debug, Clone)]
pub struct LocaleRegistry {
    locales: Vec<LocaleConfig>,
    default_index: usize,
}

static BUILTIN: OnceLock<LocaleRegistry> = OnceLock::new();

impl LocaleRegistry {
    /// Build a registry from an ordered list of locale configurations.
    ///
    /// Fails if the list is empty, contains duplicate codes, or does not
    /// have exactly one default locale.
    pub fn new(locales: Vec<LocaleConfig>) -> Result<Self> {
        if locales.is_empty() {
            bail!("Locale registry must contain at least one locale");
        }

        for (i, locale) in locales.iter().enumerate() {
            if locales[..i].iter().any(|other| other.code == locale.code) {
                bail!("Duplicate locale code: '{}'", locale.code);
            }
        }

        let defaults: Vec<usize> = locales
            .iter()
            .enumerate()
            .filter(|(_, locale)| locale.is_default)
            .map(|(i, _)| i)
            .collect();

        match defaults.as_slice() {
            [index] => Ok(Self {
                default_index: *index,
                locales,
            }),
            [] => bail!("No default locale found in registry"),
            _ => bail!("Multiple default locales found in registry"),
        }
    }

    /// Get the compiled-in registry (English default, Chinese).
    pub fn builtin() -> &'static LocaleRegistry {
        BUILTIN.get_or_init(|| LocaleRegistry {
            locales: default_locales(),
            default_index: 0,
        })
    }

    /// Get a locale configuration by its code (exact match).
    pub fn get_by_code(&self, code: &str) -> Option<&LocaleConfig> {
        self.locales.iter().find(|locale| locale.code == code)
    }

    /// Parse a code into a supported `Locale`.
    ///
    /// Matching ignores ASCII case and surrounding whitespace, so a cookie
    /// value of "ZH" still selects the `zh` locale.
    pub fn parse(&self, code: &str) -> Option<Locale> {
        let code = code.trim();
        self.locales
            .iter()
            .find(|locale| locale.code.eq_ignore_ascii_case(code))
            .map(|locale| Locale::new_unchecked(locale.code))
    }

    /// Check if a code names a supported locale.
    pub fn is_supported(&self, code: &str) -> bool {
        self.parse(code).is_some()
    }

    /// The fallback locale.
    pub fn default_locale(&self) -> Locale {
        Locale::new_unchecked(self.locales[self.default_index].code)
    }

    /// All supported locales in registration order.
    pub fn locales(&self) -> impl Iterator<Item = Locale> + '_ {
        self.locales
            .iter()
            .map(|locale| Locale::new_unchecked(locale.code))
    }

    /// All locale configurations in registration order.
    pub fn list_all(&self) -> Vec<&LocaleConfig> {
        self.locales.iter().collect()
    }
}

fn default_locales() -> Vec<LocaleConfig> {
    vec![
        LocaleConfig {
            code: "en",
            name: "English",
            native_name: "English",
            is_default: true,
        },
        LocaleConfig {
            code: "zh",
            name: "Chinese",
            native_name: "中文",
            is_default: false,
        },
    ]
}
