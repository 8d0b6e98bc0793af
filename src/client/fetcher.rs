//! HTTP layer: header assembly, throttling, transport retry and
//! credential rotation.
//!
//! Responsibility split: 5xx responses and network failures are retried
//! below this layer with exponential backoff and surface as `Transport`
//! once the budget is spent; 401/429 responses trigger credential
//! rotation here; every other non-2xx status maps 1:1 onto a typed error
//! carrying the server's message.

use crate::client::credentials::{Credential, CredentialPool};
use crate::client::rate_limiter::RateLimiter;
use crate::resilience::{retry_with_config, RetryConfig};
use crate::{Error, Result};
use reqwest::header::{HeaderMap, ACCEPT};
use serde_json::Value;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

const APIKEY_HEADER: &str = "X-ELS-APIKey";
const INSTTOKEN_HEADER: &str = "X-ELS-Insttoken";
const QUOTA_HEADER: &str = "X-RateLimit-Remaining";

/// A decoded API response: status, headers and JSON body.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Issues throttled, credential-rotated GET requests.
#[derive(Debug)]
pub struct HttpFetcher {
    http: reqwest::Client,
    credentials: Mutex<CredentialPool>,
    throttle: RateLimiter,
    retry: RetryConfig,
    last_quota: StdMutex<Option<u64>>,
}

impl HttpFetcher {
    pub fn new(
        http: reqwest::Client,
        credentials: CredentialPool,
        throttle: RateLimiter,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            credentials: Mutex::new(credentials),
            throttle,
            retry,
            last_quota: StdMutex::new(None),
        }
    }

    /// The `X-RateLimit-Remaining` value from the most recent successful
    /// response, if the service sent one.
    pub fn remaining_quota(&self) -> Option<u64> {
        *self.last_quota.lock().expect("quota lock poisoned")
    }

    /// Issue a GET against `url` with `params`, rotating credentials on
    /// 401/429 until success or pool exhaustion.
    pub async fn get(&self, url: &Url, api: &str, params: &[(String, String)]) -> Result<ApiResponse> {
        let attempts = self.credentials.lock().await.len();
        let mut last_auth_failure: Option<(u16, String)> = None;

        for _ in 0..attempts {
            let credential = self.credentials.lock().await.current().clone();
            self.throttle.acquire(api).await;

            let response = retry_with_config(
                || self.send_once(url, params, &credential),
                &self.retry,
                api,
            )
            .await?;

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let bytes = response.bytes().await.map_err(|e| Error::Transport {
                status: None,
                message: format!("failed to read response body: {e}"),
            })?;

            if (200..300).contains(&status) {
                self.record_quota(&headers);
                let body: Value = serde_json::from_slice(&bytes)?;
                debug!("GET {} -> {}", url, status);
                return Ok(ApiResponse {
                    status,
                    headers,
                    body,
                });
            }

            let message = error_message(&bytes);
            if status == 401 || status == 429 {
                warn!(
                    "HTTP {} from '{}', rotating to next credential: {}",
                    status, api, message
                );
                self.credentials.lock().await.demote();
                last_auth_failure = Some((status, message));
                continue;
            }

            return Err(Error::from_status(status, message));
        }

        let (last_status, message) = last_auth_failure.unwrap_or((401, String::new()));
        Err(Error::AuthExhausted {
            attempts,
            last_status,
            message,
        })
    }

    /// One transport attempt. 5xx is returned as a transient error so the
    /// retry layer backs off and reissues; other statuses pass through
    /// for the rotation loop to classify.
    async fn send_once(
        &self,
        url: &Url,
        params: &[(String, String)],
        credential: &Credential,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(APIKEY_HEADER, &credential.key);
        if let Some(token) = &credential.inst_token {
            request = request.header(INSTTOKEN_HEADER, token);
        }
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await.map_err(|e| Error::Transport {
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::Transport {
                status: Some(status.as_u16()),
                message: format!("server error from {}", url.host_str().unwrap_or("api")),
            });
        }
        Ok(response)
    }

    fn record_quota(&self, headers: &HeaderMap) {
        let quota = headers
            .get(QUOTA_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(quota) = quota {
            *self.last_quota.lock().expect("quota lock poisoned") = Some(quota);
        }
    }
}

/// Extract the server's explanation from a JSON error body.
///
/// The APIs use two envelope shapes: `service-error.status.statusText`
/// and `error-response.error-message`. Falls back to an empty string for
/// non-JSON bodies.
fn error_message(bytes: &[u8]) -> String {
    let Ok(body) = serde_json::from_slice::<Value>(bytes) else {
        return String::new();
    };

    body.pointer("/service-error/status/statusText")
        .or_else(|| body.pointer("/error-response/error-message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
