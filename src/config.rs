//! Connection and query settings.
//!
//! Settings live in the `[influx]` table of a TOML file; every key has a
//! default so an empty file is valid. Selected keys can be overridden from
//! the environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::SelectorConfig;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// InfluxDB connection settings
    #[serde(default)]
    pub influx: InfluxConfig,
}

/// InfluxDB connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluxConfig {
    /// Base URL of the InfluxDB HTTP API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,

    /// Database to query
    #[serde(default)]
    pub api_database: String,

    /// Basic auth user
    #[serde(default)]
    pub api_username: String,

    /// Basic auth password
    #[serde(default)]
    pub api_password: String,

    /// Points per metric above which results are downsampled (<= 0 disables)
    #[serde(default = "default_max_data_points")]
    pub api_max_data_points: i64,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub api_tls_insecure: bool,

    /// Tag key holding the host name
    #[serde(default = "default_host_tag")]
    pub writer_host_name_template_tag: String,

    /// Tag key holding the service name
    #[serde(default = "default_service_tag")]
    pub writer_service_name_template_tag: String,
}

fn default_api_url() -> String { "http://localhost:8086".to_string() }
fn default_api_timeout() -> u64 { 10 }
fn default_max_data_points() -> i64 { 10_000 }
fn default_host_tag() -> String { "hostname".to_string() }
fn default_service_tag() -> String { "service".to_string() }

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_timeout: default_api_timeout(),
            api_database: String::new(),
            api_username: String::new(),
            api_password: String::new(),
            api_max_data_points: default_max_data_points(),
            api_tls_insecure: false,
            writer_host_name_template_tag: default_host_tag(),
            writer_service_name_template_tag: default_service_tag(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.normalize();
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration, falling back to the defaults if it cannot be read
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = match Self::from_file(path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default configuration");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PERFDATA_INFLUX_URL") {
            self.influx.api_url = url;
        }
        if let Ok(database) = std::env::var("PERFDATA_INFLUX_DATABASE") {
            self.influx.api_database = database;
        }
        if let Ok(username) = std::env::var("PERFDATA_INFLUX_USERNAME") {
            self.influx.api_username = username;
        }
        if let Ok(password) = std::env::var("PERFDATA_INFLUX_PASSWORD") {
            self.influx.api_password = password;
        }
        if let Ok(points) = std::env::var("PERFDATA_INFLUX_MAX_DATA_POINTS") {
            if let Ok(p) = points.parse() {
                self.influx.api_max_data_points = p;
            }
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        let trimmed = self.influx.api_url.trim_end_matches('/').len();
        self.influx.api_url.truncate(trimmed);
    }

    /// Tag keys used in query selectors
    pub fn selector(&self) -> SelectorConfig {
        SelectorConfig::new(
            self.influx.writer_host_name_template_tag.clone(),
            self.influx.writer_service_name_template_tag.clone(),
        )
    }

    /// Whether the transport verifies TLS certificates
    pub fn tls_verify(&self) -> bool {
        !self.influx.api_tls_insecure
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.influx.api_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.influx.api_url, "http://localhost:8086");
        assert_eq!(config.influx.api_timeout, 10);
        assert_eq!(config.influx.api_max_data_points, 10_000);
        assert!(config.tls_verify());
        assert_eq!(config.selector(), SelectorConfig::default());
    }

    #[test]
    fn test_parse_influx_table() {
        let config = Config::from_toml_str(
            r#"
            [influx]
            api_url = "https://influx.example.com:8086//"
            api_database = "icinga2"
            api_max_data_points = 0
            api_tls_insecure = true
            writer_host_name_template_tag = "host"
            "#,
        )
        .unwrap();

        assert_eq!(config.influx.api_url, "https://influx.example.com:8086");
        assert_eq!(config.influx.api_database, "icinga2");
        assert_eq!(config.influx.api_max_data_points, 0);
        assert!(!config.tls_verify());
        assert_eq!(config.selector(), SelectorConfig::new("host", "service"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[influx\napi_url = 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[serial]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default("/nonexistent/perfdata-influxdb.toml");
        assert_eq!(config.influx.api_timeout, 10);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        // SAFETY: serialized with the other tests touching the environment
        unsafe {
            std::env::set_var("PERFDATA_INFLUX_MAX_DATA_POINTS", "500");
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("PERFDATA_INFLUX_MAX_DATA_POINTS");
        }
        assert_eq!(config.influx.api_max_data_points, 500);
    }
}
