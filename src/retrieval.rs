//! Single-resource fetch orchestration: resolve the cache path, decide
//! freshness, then either load from disk or download once and persist.

use crate::api::{Endpoint, EndpointKind, IdType, View};
use crate::cache::{CacheStore, RefreshPolicy};
use crate::client::fetcher::HttpFetcher;
use crate::{Error, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// A single-resource fetch, as constructed by an endpoint wrapper.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub endpoint: Endpoint,
    pub view: View,
    pub identifier: String,
    /// Identifier namespace; defaults to the endpoint's usual one
    pub id_type: Option<IdType>,
    /// Extra query parameters, validated against the endpoint allow-list
    pub params: Vec<(String, String)>,
    pub refresh: RefreshPolicy,
}

impl RetrievalRequest {
    pub fn new(endpoint: Endpoint, identifier: impl Into<String>) -> Self {
        Self {
            endpoint,
            view: View::default(),
            identifier: identifier.into(),
            id_type: None,
            params: Vec::new(),
            refresh: RefreshPolicy::default(),
        }
    }

    pub fn view(mut self, view: View) -> Self {
        self.view = view;
        self
    }

    pub fn id_type(mut self, id_type: IdType) -> Self {
        self.id_type = Some(id_type);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }
}

/// Fetch one resource, honoring the cache and the refresh policy.
pub(crate) async fn fetch(
    fetcher: &HttpFetcher,
    cache: &CacheStore,
    base_url: &str,
    request: &RetrievalRequest,
) -> Result<Value> {
    if request.endpoint.kind() != EndpointKind::Retrieval {
        return Err(Error::InvalidInput {
            field: "endpoint".to_string(),
            reason: format!("{} is not a retrieval endpoint", request.endpoint.name()),
        });
    }
    request.endpoint.check_params(&request.params)?;

    let api = request.endpoint.name();
    let view = request.view.as_str();
    let path = cache.retrieval_path(api, view, &request.identifier);

    if !cache.is_stale(&path, request.refresh) {
        match cache.load_single(&path).await {
            Ok(value) => return Ok(value),
            // Unreadable cache file: treat as stale and re-download
            Err(e) => warn!(
                "Discarding unreadable cache file {}: {}",
                path.display(),
                e
            ),
        }
    }

    let id_type = request.id_type.unwrap_or(request.endpoint.default_id_type());
    let url = request
        .endpoint
        .retrieval_url(base_url, id_type, &request.identifier)?;

    let mut params = vec![("view".to_string(), view.to_string())];
    params.extend(request.params.iter().cloned());

    debug!("Retrieving {} {} ({})", api, request.identifier, view);
    let response = fetcher.get(&url, api, &params).await?;

    cache.save_single(&path, &response.body).await?;
    Ok(response.body)
}
