//! Geo-IP lookup used as the lowest-precedence locale signal.

use crate::i18n::Locale;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Geo lookup is disabled")]
    Disabled,

    #[error("Geo lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Geo lookup service returned status {0}")]
    Status(u16),

    #[error("Geo lookup response has no country code")]
    MissingCountry,
}

/// Location summary for a client address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub country: String,
    pub country_code: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub suggested_locale: Locale,
}

/// Map an ISO 3166 country code to the locale we suggest for it.
///
/// Chinese-speaking territories map to `zh`; every other country maps
/// to `en`.
pub fn country_locale(country_code: &str) -> Locale {
    match country_code.to_ascii_uppercase().as_str() {
        "CN" | "TW" | "HK" | "MO" | "SG" | "MY" => Locale::ZH,
        _ => Locale::EN,
    }
}

/// A source of client location.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn lookup(&self, ip: Option<IpAddr>) -> Result<LocationInfo, GeoError>;
}

/// Locator used when geo lookup is turned off.
pub struct DisabledGeoLocator;

#[async_trait]
impl GeoLocator for DisabledGeoLocator {
    async fn lookup(&self, _ip: Option<IpAddr>) -> Result<LocationInfo, GeoError> {
        Err(GeoError::Disabled)
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    country_code: Option<String>,
    country: Option<String>,
    country_name: Option<String>,
    city: Option<String>,
    region: Option<String>,
}

/// Locator backed by an ipapi.co-compatible JSON service.
pub struct IpApiLocator {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiLocator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self, ip: Option<IpAddr>) -> String {
        match ip {
            Some(ip) => format!("{}/{}/json/", self.base_url, ip),
            None => format!("{}/json/", self.base_url),
        }
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn lookup(&self, ip: Option<IpAddr>) -> Result<LocationInfo, GeoError> {
        let url = self.lookup_url(ip);
        debug!("Geo lookup: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let data: IpApiResponse = response.json().await?;
        let country_code = data
            .country_code
            .or_else(|| data.country.clone())
            .filter(|code| !code.trim().is_empty())
            .ok_or(GeoError::MissingCountry)?;

        Ok(LocationInfo {
            country: data
                .country_name
                .or(data.country)
                .unwrap_or_else(|| country_code.clone()),
            suggested_locale: country_locale(&country_code),
            country_code,
            city: data.city,
            region: data.region,
        })
    }
}
