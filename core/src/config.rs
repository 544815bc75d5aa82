//! Connection settings for the venue service.
//!
//! The three values come from the environment (optionally seeded from a
//! `.env` file). A missing or blank value is a startup error: the client is
//! unusable without it.

use std::env;
use std::fmt;

use thiserror::Error;

pub const BASE_URL_VAR: &str = "VENUE_SCAN_BASE_URL";
pub const API_KEY_VAR: &str = "VENUE_SCAN_API_KEY";
pub const AUTH_TOKEN_VAR: &str = "VENUE_SCAN_AUTH_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing configuration value {0}")]
    Missing(&'static str),

    #[error("configuration value {0} is empty")]
    Empty(&'static str),
}

/// Base URL plus the two credentials injected into every request.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    api_key: String,
    auth_token: String,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = non_empty(BASE_URL_VAR, base_url.into())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: non_empty(API_KEY_VAR, api_key.into())?,
            auth_token: non_empty(AUTH_TOKEN_VAR, auth_token.into())?,
        })
    }

    /// Read the settings from the process environment, loading `.env` first
    /// if one exists. Variables already set take precedence over the file.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        Self::new(get(BASE_URL_VAR)?, get(API_KEY_VAR)?, get(AUTH_TOKEN_VAR)?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

fn non_empty(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty(name))
    } else {
        Ok(value)
    }
}
