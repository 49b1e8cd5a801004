//! Locale type: a code that is known to belong to a registry.

use crate::i18n::LocaleRegistry;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A supported locale.
///
/// Values are only produced by a [`LocaleRegistry`] (or the constants below,
/// which name locales of the built-in registry), so holding a `Locale` means
/// the code is one the site can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locale {
    code: &'static str,
}

impl Locale {
    /// English, the built-in default.
    pub const EN: Locale = Locale { code: "en" };

    /// Chinese.
    pub const ZH: Locale = Locale { code: "zh" };

    pub(crate) fn new_unchecked(code: &'static str) -> Self {
        Locale { code }
    }

    /// Look up a code in the built-in registry.
    pub fn from_code(code: &str) -> Option<Locale> {
        LocaleRegistry::builtin().parse(code)
    }

    /// The short locale code (e.g. "en").
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// The URL prefix for this locale (e.g. "/en").
    pub fn path_prefix(&self) -> String {
        format!("/{}", self.code)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code)
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Locale::from_code(&code)
            .ok_or_else(|| D::Error::custom(format!("unsupported locale '{}'", code)))
    }
}
