use anyhow::{bail, Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub bind_address: String,

    // Content (no posts directory means a read-only, empty store)
    pub content_dir: Option<PathBuf>,
    pub pages_dir: PathBuf,
    pub static_dir: PathBuf,

    // Geo-IP locale detection
    pub geo_lookup_enabled: bool,
    pub geo_lookup_url: String,
    pub geo_lookup_timeout: Duration,

    // Rate limiting for /api/auth
    pub auth_rate_limit_max: u32,
    pub auth_rate_limit_window: Duration,

    // Authoring
    pub admin_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            content_dir: Some(PathBuf::from("content/posts")),
            pages_dir: PathBuf::from("content/pages"),
            static_dir: PathBuf::from("public"),
            geo_lookup_enabled: true,
            geo_lookup_url: "https://ipapi.co".to_string(),
            geo_lookup_timeout: Duration::from_millis(2000),
            auth_rate_limit_max: 5,
            auth_rate_limit_window: Duration::from_secs(60),
            admin_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            // Server
            port: parse_env("PORT").unwrap_or(defaults.port),
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),

            // Content - an empty CONTENT_DIR disables the filesystem store
            content_dir: match std::env::var("CONTENT_DIR") {
                Ok(dir) if dir.trim().is_empty() => None,
                Ok(dir) => Some(PathBuf::from(dir)),
                Err(_) => defaults.content_dir,
            },
            pages_dir: std::env::var("PAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.pages_dir),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),

            // Geo-IP
            geo_lookup_enabled: std::env::var("GEO_LOOKUP_ENABLED")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.geo_lookup_enabled),
            geo_lookup_url: std::env::var("GEO_LOOKUP_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.geo_lookup_url),
            geo_lookup_timeout: parse_env("GEO_LOOKUP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.geo_lookup_timeout),

            // Rate limiting
            auth_rate_limit_max: parse_env("AUTH_RATE_LIMIT_MAX")
                .unwrap_or(defaults.auth_rate_limit_max),
            auth_rate_limit_window: parse_env("AUTH_RATE_LIMIT_WINDOW_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.auth_rate_limit_window),

            // Authoring
            admin_api_key: std::env::var("ADMIN_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
        };

        if config.geo_lookup_enabled {
            url::Url::parse(&config.geo_lookup_url)
                .with_context(|| format!("GEO_LOOKUP_URL is not a valid URL: {}", config.geo_lookup_url))?;
        }

        Ok(config)
    }

    /// Address the server listens on.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .with_context(|| format!("BIND_ADDRESS is not an IP address: {}", self.bind_address))?;
        if self.port == 0 {
            bail!("PORT must not be 0");
        }
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 11] = [
        "PORT",
        "BIND_ADDRESS",
        "CONTENT_DIR",
        "PAGES_DIR",
        "STATIC_DIR",
        "GEO_LOOKUP_ENABLED",
        "GEO_LOOKUP_URL",
        "GEO_LOOKUP_TIMEOUT_MS",
        "AUTH_RATE_LIMIT_MAX",
        "AUTH_RATE_LIMIT_WINDOW_SECS",
        "ADMIN_API_KEY",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.content_dir, Some(PathBuf::from("content/posts")));
        assert!(config.geo_lookup_enabled);
        assert_eq!(config.geo_lookup_timeout, Duration::from_secs(2));
        assert_eq!(config.auth_rate_limit_max, 5);
        assert_eq!(config.auth_rate_limit_window, Duration::from_secs(60));
        assert!(config.admin_api_key.is_none());
        assert_eq!(
            config.socket_addr().unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("PORT", "3000");
        std::env::set_var("CONTENT_DIR", "/srv/posts");
        std::env::set_var("GEO_LOOKUP_ENABLED", "false");
        std::env::set_var("GEO_LOOKUP_URL", "http://localhost:9000/");
        std::env::set_var("AUTH_RATE_LIMIT_MAX", "10");
        std::env::set_var("ADMIN_API_KEY", "s3cret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.content_dir, Some(PathBuf::from("/srv/posts")));
        assert!(!config.geo_lookup_enabled);
        assert_eq!(config.geo_lookup_url, "http://localhost:9000");
        assert_eq!(config.auth_rate_limit_max, 10);
        assert_eq!(config.admin_api_key.as_deref(), Some("s3cret"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_numbers_fall_back_to_defaults() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("GEO_LOOKUP_TIMEOUT_MS", "-5");
        std::env::set_var("AUTH_RATE_LIMIT_WINDOW_SECS", "0");
        std::env::set_var("GEO_LOOKUP_ENABLED", "maybe");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.geo_lookup_timeout, Duration::from_secs(2));
        assert_eq!(config.auth_rate_limit_window, Duration::from_secs(60));
        assert!(config.geo_lookup_enabled);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_content_dir_disables_store() {
        clear_env();
        std::env::set_var("CONTENT_DIR", "");
        std::env::set_var("ADMIN_API_KEY", "");
        let config = Config::from_env().unwrap();
        assert!(config.content_dir.is_none());
        assert!(config.admin_api_key.is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_geo_url_is_an_error() {
        clear_env();
        std::env::set_var("GEO_LOOKUP_URL", "not a url");
        assert!(Config::from_env().is_err());

        std::env::set_var("GEO_LOOKUP_ENABLED", "0");
        assert!(Config::from_env().is_ok());
        clear_env();
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = Config {
            bind_address: "localhost".to_string(),
            ..Config::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
