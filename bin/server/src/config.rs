//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables with `__` as the
//! nesting separator (`IDENTITY__BASE_URL`, `COOKIE__SECURE`, ...).

use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Identity provider connection settings.
    pub identity: IdentityConfig,

    /// Backend service connection settings.
    pub backend: BackendConfig,

    /// Auth cookie settings.
    #[serde(default)]
    pub cookie: CookieConfig,

    /// Route prefix served by the identity provider; requests under it skip
    /// session resolution and are forwarded upstream.
    #[serde(default = "default_auth_route_prefix")]
    pub auth_route_prefix: String,
}

/// Identity provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Origin of the identity provider (e.g. "https://auth.example.com").
    pub base_url: String,

    /// Per-request timeout for calls to the provider, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

/// Backend service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Origin of the backend service's HTTP API.
    pub url: String,

    /// When set, the client never hands its token fetcher to the backend.
    #[serde(default)]
    pub disabled: bool,
}

/// Auth cookie settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    /// Cookie holding the bearer token.
    #[serde(default = "default_cookie_name")]
    pub name: String,

    /// Whether to set the Secure flag (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure: bool,

    /// Lifetime of a freshly issued cookie, in days.
    #[serde(default = "default_cookie_max_age_days")]
    pub max_age_days: i64,
}

fn default_auth_route_prefix() -> String {
    "/api/auth".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_cookie_name() -> String {
    "session_token".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_cookie_max_age_days() -> i64 {
    7
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            secure: default_secure_cookies(),
            max_age_days: default_cookie_max_age_days(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
