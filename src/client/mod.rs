pub mod credentials;
pub mod fetcher;
pub mod rate_limiter;

pub use credentials::{Credential, CredentialPool};
pub use fetcher::{ApiResponse, HttpFetcher};
pub use rate_limiter::RateLimiter;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::resilience::RetryConfig;
use crate::retrieval::{self, RetrievalRequest};
use crate::search::{self, SearchRequest, SearchResults};
use crate::{api::Endpoint, Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP client configuration shared by every request
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout duration
    pub timeout: Duration,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("elsevier-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Explicitly constructed session owning the credential pool, throttle
/// windows and cache handle. Endpoint wrappers hold a reference and call
/// [`Client::retrieve`] or [`Client::search`].
#[derive(Debug)]
pub struct Client {
    base_url: String,
    fetcher: HttpFetcher,
    cache: CacheStore,
}

impl Client {
    /// Build a client from configuration, taking credentials from the
    /// `authentication` section.
    pub fn new(config: &Config) -> Result<Self> {
        let credentials = config.credentials()?;
        Self::with_credentials(config, credentials)
    }

    /// Build a client with an explicit credential list, bypassing the
    /// `authentication` section.
    pub fn with_credentials(config: &Config, credentials: Vec<Credential>) -> Result<Self> {
        config.validate().or_else(|e| match e {
            // the explicit list replaces the configured one
            Error::MissingCredentials if !credentials.is_empty() => Ok(()),
            other => Err(other),
        })?;

        let pool = CredentialPool::new(credentials)?;
        debug!("Client initialized with {} credentials", pool.len());

        let http_config = HttpClientConfig {
            timeout: Duration::from_secs(config.requests.timeout_secs),
            ..HttpClientConfig::default()
        };
        let http = reqwest::Client::builder()
            .timeout(http_config.timeout)
            .connect_timeout(http_config.connect_timeout)
            .user_agent(&http_config.user_agent)
            .build()
            .map_err(|e| Error::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let mut limits = HashMap::new();
        for endpoint in Endpoint::all() {
            let name = endpoint.name();
            let limit = config
                .rate_limits
                .overrides
                .get(name)
                .copied()
                .unwrap_or_else(|| endpoint.default_rate_limit());
            limits.insert(name.to_string(), limit);
        }
        let throttle = RateLimiter::new(limits);
        let retry = RetryConfig::with_retries(config.requests.retries);

        Ok(Self {
            base_url: config.base_url.clone(),
            fetcher: HttpFetcher::new(http, pool, throttle, retry),
            cache: CacheStore::new(config.directories.clone()),
        })
    }

    /// Fetch one resource, from cache or the service.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Value> {
        retrieval::fetch(&self.fetcher, &self.cache, &self.base_url, request).await
    }

    /// Run a paginated search, from cache or the service.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        search::fetch(&self.fetcher, &self.cache, &self.base_url, request).await
    }

    /// Remaining key quota reported by the most recent response.
    pub fn remaining_quota(&self) -> Option<u64> {
        self.fetcher.remaining_quota()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthenticationConfig;

    fn config() -> Config {
        Config {
            authentication: AuthenticationConfig {
                api_keys: vec!["key".to_string()],
                inst_tokens: Vec::new(),
            },
            ..Config::default()
        }
    }

    #[test]
    fn client_requires_credentials() {
        let config = Config::default();
        assert!(matches!(
            Client::new(&config),
            Err(Error::MissingCredentials)
        ));
    }

    #[test]
    fn explicit_credentials_override_empty_config() {
        let config = Config::default();
        let client =
            Client::with_credentials(&config, vec![Credential::new("override")]).unwrap();
        assert!(client.remaining_quota().is_none());
    }

    #[test]
    fn client_builds_from_valid_config() {
        assert!(Client::new(&config()).is_ok());
    }
}
