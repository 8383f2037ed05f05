//! Identity Guard configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! never mutated afterwards. The guard itself only sees the immutable
//! [`GuardConfig`] derived from it. The client id is redacted in Debug
//! output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default Microsoft identity platform authority.
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// Default bind address for the demo service.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default signing key cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default timeout for a signing key discovery request in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Settings the token pipeline needs for every validation.
///
/// Built once at startup and moved into the guard.
#[derive(Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Directory (tenant) id of the issuing identity provider.
    pub tenant_id: String,

    /// Application (client) id; the expected audience.
    pub client_id: String,

    /// Clock skew tolerated on `exp`, `nbf` and `iat`.
    pub clock_skew: Duration,
}

impl GuardConfig {
    /// Create a guard configuration with zero clock skew tolerance.
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    /// Override the clock skew tolerance.
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &"[REDACTED]")
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

/// Service configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Tenant id used in discovery URL, issuer and audience checks.
    pub tenant_id: String,

    /// Client id used as the expected audience.
    pub client_id: String,

    /// Identity provider authority (default: Microsoft identity platform).
    pub authority_url: String,

    /// JWT clock skew tolerance in seconds (default: 0).
    pub jwt_clock_skew_seconds: u64,

    /// Signing key cache TTL in seconds; 0 disables caching.
    pub jwks_cache_ttl_seconds: u64,

    /// Timeout for one discovery request in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Scope required by the protected demo endpoint, if any.
    pub required_scope: Option<String>,
}

/// Custom Debug implementation that redacts the client id.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &"[REDACTED]")
            .field("authority_url", &self.authority_url)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field(
                "jwks_fetch_timeout_seconds",
                &self.jwks_fetch_timeout_seconds,
            )
            .field("required_scope", &self.required_scope)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid authority URL: {0}")]
    InvalidAuthorityUrl(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidJwksFetchTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let tenant_id = required_var(vars, "AZURE_TENANT_ID")?;
        let client_id = required_var(vars, "AZURE_CLIENT_ID")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let authority_url = match vars.get("AUTHORITY_URL") {
            Some(value) => {
                if !value.starts_with("https://") && !value.starts_with("http://") {
                    return Err(ConfigError::InvalidAuthorityUrl(format!(
                        "AUTHORITY_URL must start with http:// or https://, got '{}'",
                        value
                    )));
                }
                value.trim_end_matches('/').to_string()
            }
            None => DEFAULT_AUTHORITY_URL.to_string(),
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value < 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not be negative, got {}",
                    value
                )));
            }

            let value = value.unsigned_abs();
            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidJwksCache(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwksFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidJwksFetchTimeout(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let required_scope = vars
            .get("REQUIRED_SCOPE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            bind_address,
            tenant_id,
            client_id,
            authority_url,
            jwt_clock_skew_seconds,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            required_scope,
        })
    }

    /// Immutable settings handed to the guard.
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig::new(self.tenant_id.clone(), self.client_id.clone())
            .with_clock_skew(Duration::from_secs(self.jwt_clock_skew_seconds))
    }
}

fn required_var(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}
