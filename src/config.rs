//! # Configuration
//!
//! Typed configuration for the client, layered from an optional TOML file
//! and `ELSEVIER__`-prefixed environment variables. The core consumes four
//! sections: `directories` (cache roots), `authentication` (API keys and
//! institutional tokens), `requests` (timeout and retry budget) and
//! `rate_limits` (per-API requests-per-second overrides).

use crate::client::credentials::Credential;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Default API host; tests point this at a local mock server.
pub const DEFAULT_BASE_URL: &str = "https://api.elsevier.com";

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the API host
    pub base_url: String,
    /// Cache directory layout
    pub directories: DirectoriesConfig,
    /// API credentials
    pub authentication: AuthenticationConfig,
    /// HTTP request behavior
    pub requests: RequestsConfig,
    /// Per-API throttle overrides
    pub rate_limits: RateLimitsConfig,
}

/// Cache directory layout: one root, optionally overridden per API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    /// Root directory under which per-API cache trees live
    pub cache_root: PathBuf,
    /// Per-API root overrides, keyed by API cache name
    pub overrides: HashMap<String, PathBuf>,
}

/// API credentials: ordered key list plus optional institutional tokens.
///
/// Tokens pair positionally with keys; a token at index `i` belongs to the
/// key at index `i`. There may be fewer tokens than keys, never more.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// API keys, in preference order
    pub api_keys: Vec<String>,
    /// Institutional tokens, paired positionally with `api_keys`
    pub inst_tokens: Vec<String>,
}

/// HTTP request behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestsConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Transport retry budget for 5xx and network failures
    pub retries: u32,
}

/// Per-API throttle overrides, keyed by API cache name.
///
/// APIs absent from the map use their documented default limit; an entry
/// of 0 disables throttling for that API.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RateLimitsConfig {
    pub overrides: HashMap<String, u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            directories: DirectoriesConfig::default(),
            authentication: AuthenticationConfig::default(),
            requests: RequestsConfig::default(),
            rate_limits: RateLimitsConfig::default(),
        }
    }
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        let cache_root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("elsevier-client");
        Self {
            cache_root,
            overrides: HashMap::new(),
        }
    }
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            inst_tokens: Vec::new(),
        }
    }
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            retries: 3,
        }
    }
}

impl Config {
    /// Load configuration from the default file location and environment.
    ///
    /// The file (`<config dir>/elsevier-client/config.toml`) is optional;
    /// `ELSEVIER__`-prefixed environment variables override it, e.g.
    /// `ELSEVIER__REQUESTS__TIMEOUT_SECS=30`.
    pub fn load() -> Result<Self> {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("elsevier-client")
            .join("config.toml");
        Self::load_from(&path)
    }

    /// Load configuration from an explicit file path plus the environment.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("ELSEVIER").separator("__"))
            .build()?;
        let cfg: Self = settings.try_deserialize()?;
        Ok(cfg)
    }

    /// Write this configuration as TOML, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        let rendered = toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig {
            reason: format!("cannot serialize configuration: {e}"),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, rendered)?;
        Ok(())
    }

    /// Validate the configuration, failing fast on unusable credentials.
    pub fn validate(&self) -> Result<()> {
        if self.authentication.api_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(Error::MissingCredentials);
        }
        if self.authentication.inst_tokens.len() > self.authentication.api_keys.len() {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "{} institutional tokens configured for {} API keys; tokens pair 1:1 with keys",
                    self.authentication.inst_tokens.len(),
                    self.authentication.api_keys.len()
                ),
            });
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig {
                reason: "base_url must not be empty".to_string(),
            });
        }
        if self.requests.timeout_secs == 0 {
            return Err(Error::InvalidConfig {
                reason: "requests.timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Assemble the credential rotation list from the authentication section.
    ///
    /// Keys with an institutional token sort ahead of plain keys; relative
    /// order within each group is preserved.
    pub fn credentials(&self) -> Result<Vec<Credential>> {
        self.validate()?;
        let auth = &self.authentication;
        let mut with_token = Vec::new();
        let mut plain = Vec::new();
        for (i, key) in auth.api_keys.iter().enumerate() {
            if key.trim().is_empty() {
                continue;
            }
            match auth.inst_tokens.get(i).filter(|t| !t.trim().is_empty()) {
                Some(token) => with_token.push(Credential {
                    key: key.clone(),
                    inst_token: Some(token.clone()),
                }),
                None => plain.push(Credential {
                    key: key.clone(),
                    inst_token: None,
                }),
            }
        }
        with_token.extend(plain);
        Ok(with_token)
    }

}
