//! PIA configuration.
//!
//! Configuration is loaded from `PIA_`-prefixed environment variables. The
//! DependencyTrack API key is held as a `SecretString` and redacted in Debug
//! output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default expected token audience.
pub const DEFAULT_EXPECTED_AUDIENCE: &str = "pia.eclipse.org";

/// Default DependencyTrack BOM upload endpoint.
pub const DEFAULT_DEPENDENCY_TRACK_URL: &str = "https://sbom.eclipse.org/api/v1/bom";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default per-fetch timeout for OIDC discovery, in seconds.
pub const DEFAULT_OIDC_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the OIDC fetch timeout, in seconds.
pub const MAX_OIDC_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// PIA configuration.
#[derive(Clone)]
pub struct Config {
    /// DependencyTrack API key, sent as `X-Api-Key`.
    pub dependency_track_api_key: SecretString,

    /// Path of the projects YAML file.
    pub projects_path: PathBuf,

    /// Audience every identity token must be issued for.
    pub expected_audience: String,

    /// DependencyTrack BOM upload URL.
    pub dependency_track_url: String,

    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Tolerance applied to token `iat` and `exp`.
    pub jwt_clock_skew: Duration,

    /// Upper bound on each OIDC discovery / JWKS fetch.
    pub oidc_fetch_timeout: Duration,

    /// Time to keep serving after a shutdown signal before draining.
    pub drain_period: Duration,

    /// Emit logs as JSON lines.
    pub log_json: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("dependency_track_api_key", &"[REDACTED]")
            .field("projects_path", &self.projects_path)
            .field("expected_audience", &self.expected_audience)
            .field("dependency_track_url", &self.dependency_track_url)
            .field("bind_address", &self.bind_address)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("oidc_fetch_timeout", &self.oidc_fetch_timeout)
            .field("drain_period", &self.drain_period)
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid OIDC fetch timeout configuration: {0}")]
    InvalidOidcFetchTimeout(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),

    #[error("Invalid DependencyTrack URL: {0}")]
    InvalidDependencyTrackUrl(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let dependency_track_api_key = vars
            .get("PIA_DEPENDENCY_TRACK_API_KEY")
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.as_str()))
            .ok_or_else(|| ConfigError::MissingEnvVar("PIA_DEPENDENCY_TRACK_API_KEY".to_string()))?;

        let projects_path = vars
            .get("PIA_PROJECTS_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("PIA_PROJECTS_PATH".to_string()))?;

        let expected_audience = vars
            .get("PIA_EXPECTED_AUDIENCE")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_EXPECTED_AUDIENCE.to_string());

        let dependency_track_url = vars
            .get("PIA_DEPENDENCY_TRACK_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DEPENDENCY_TRACK_URL.to_string());
        validate_http_url(&dependency_track_url)?;

        let bind_address = vars
            .get("PIA_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("PIA_JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "PIA_JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            let value = u64::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidJwtClockSkew(format!(
                        "PIA_JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                        value
                    ))
                })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "PIA_JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        // Parse OIDC fetch timeout with validation
        let oidc_fetch_timeout = if let Some(value_str) = vars.get("PIA_OIDC_FETCH_TIMEOUT_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidOidcFetchTimeout(format!(
                    "PIA_OIDC_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_OIDC_FETCH_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidOidcFetchTimeout(format!(
                    "PIA_OIDC_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_OIDC_FETCH_TIMEOUT_SECONDS, value
                )));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_OIDC_FETCH_TIMEOUT_SECONDS)
        };

        let drain_period = if let Some(value_str) = vars.get("PIA_DRAIN_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "PIA_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            Duration::from_secs(value)
        } else {
            Duration::ZERO
        };

        let log_json = vars
            .get("PIA_LOG_JSON")
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Ok(Config {
            dependency_track_api_key,
            projects_path,
            expected_audience,
            dependency_track_url,
            bind_address,
            jwt_clock_skew,
            oidc_fetch_timeout,
            drain_period,
            log_json,
        })
    }
}

fn validate_http_url(value: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(value).map_err(|e| {
        ConfigError::InvalidDependencyTrackUrl(format!("'{}' is not a valid URL: {}", value, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidDependencyTrackUrl(format!(
            "'{}' must use http or https",
            value
        )));
    }

    Ok(())
}
