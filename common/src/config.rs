//! Provider configuration.
//!
//! Connection settings default to a local InfluxDB and can be overridden one
//! by one from the environment.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// Default InfluxDB endpoint.
pub const DEFAULT_INFLUXDB_URL: &str = "http://localhost:8086/";

pub const ENV_URL: &str = "INFLUXDB_URL";
pub const ENV_USERNAME: &str = "INFLUXDB_USERNAME";
pub const ENV_PASSWORD: &str = "INFLUXDB_PASSWORD";
pub const ENV_SKIP_SSL_VERIFY: &str = "INFLUXDB_SKIP_SSL_VERIFY";

/// Connection settings for the InfluxDB control API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InfluxConfig {
    /// Endpoint URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Username (empty for no authentication).
    #[serde(default)]
    pub username: String,
    /// Password (never serialized back).
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Disable TLS certificate verification.
    #[serde(default)]
    pub skip_ssl_verify: bool,
}

fn default_url() -> String {
    DEFAULT_INFLUXDB_URL.to_string()
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            password: String::new(),
            skip_ssl_verify: false,
        }
    }
}

impl InfluxConfig {
    /// Loads settings from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary lookup, falling back to defaults
    /// for every key the lookup does not know.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let skip_ssl_verify = match lookup(ENV_SKIP_SSL_VERIFY) {
            Some(raw) => parse_bool(ENV_SKIP_SSL_VERIFY, &raw)?,
            None => defaults.skip_ssl_verify,
        };

        Ok(Self {
            url: lookup(ENV_URL).unwrap_or(defaults.url),
            username: lookup(ENV_USERNAME).unwrap_or(defaults.username),
            password: lookup(ENV_PASSWORD).unwrap_or(defaults.password),
            skip_ssl_verify,
        })
    }

    /// Whether credentials should be attached to requests.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

fn parse_bool(name: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::InvalidSetting {
            name: name.to_string(),
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}

/// HTTP server settings for the provider process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Transport timeout for every request sent to InfluxDB.
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Loads server settings for the named service.
    pub fn load_with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8090),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}
