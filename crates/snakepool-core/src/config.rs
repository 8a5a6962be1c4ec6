use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::Tolerance;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

fn default_rest_url() -> String {
    "http://localhost:8080/v1".into()
}
fn default_grpc_endpoint() -> String {
    "http://localhost:50051".into()
}
const fn default_request_timeout_ms() -> u64 {
    10_000
}
const fn default_connect_timeout_ms() -> u64 {
    5_000
}
const fn default_dense_tolerance() -> f64 {
    1e-9
}
const fn default_echo_tolerance() -> f64 {
    1e-8
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Connection and comparison settings shared by both transports.
///
/// # Example
///
/// ```
/// use snakepool_core::config::ClientConfig;
///
/// let config = ClientConfig::from_toml_str(r#"
///     rest_url = "http://10.0.0.5:8080/v1"
///     request_timeout_ms = 2500
/// "#).unwrap();
/// assert_eq!(config.grpc_endpoint, "http://localhost:50051");
/// assert_eq!(config.request_timeout().as_millis(), 2500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the JSON API, including the `/v1` prefix.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// URI of the RPC endpoint (`http://host:port`).
    #[serde(default = "default_grpc_endpoint")]
    pub grpc_endpoint: String,

    /// Per-request timeout in milliseconds (default: 10 s).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Connection establishment timeout in milliseconds (default: 5 s).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Absolute tolerance for dense observation equality.
    #[serde(default = "default_dense_tolerance")]
    pub dense_tolerance: f64,

    /// Absolute tolerance for "signal is zero" in echo checks.
    #[serde(default = "default_echo_tolerance")]
    pub echo_tolerance: f64,

    /// Ask the server to attach a raw render frame to every outcome.
    #[serde(default)]
    pub with_raw: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            grpc_endpoint: default_grpc_endpoint(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            dense_tolerance: default_dense_tolerance(),
            echo_tolerance: default_echo_tolerance(),
            with_raw: false,
        }
    }
}

impl ClientConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("rest_url", &self.rest_url)?;
        validate_url("grpc_endpoint", &self.grpc_endpoint)?;
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms", "must be > 0"));
        }
        validate_tolerance("dense_tolerance", self.dense_tolerance)?;
        validate_tolerance("echo_tolerance", self.echo_tolerance)?;
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Observation comparison tolerance derived from `dense_tolerance`.
    pub const fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.dense_tolerance)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(invalid(field, "must start with http:// or https://"));
    }
    Ok(())
}

fn validate_tolerance(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, "must be finite and >= 0"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
