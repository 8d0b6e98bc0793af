//! Paginated search orchestration.
//!
//! State machine: probe the first page to learn the total result count,
//! short-circuit on zero results, enforce the maximum-result guard for
//! offset-mode queries, then walk the remaining pages (cursor token or
//! offset increments) appending entries in server order, and persist the
//! assembled list as newline-delimited JSON. With `download` off, only
//! the probe request is issued and the total is still available.

use crate::api::{Endpoint, EndpointKind, View};
use crate::cache::{CacheStore, RefreshPolicy};
use crate::client::fetcher::HttpFetcher;
use crate::{Error, Result};
use serde::de::Error as _;
use serde_json::Value;
use tracing::{debug, warn};

/// Offset-mode searches refuse result sets larger than this unless the
/// caller raises the bound.
pub const DEFAULT_MAX_RESULTS: u64 = 5_000;

/// A paginated search, as constructed by an endpoint wrapper.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub endpoint: Endpoint,
    pub view: View,
    pub query: String,
    /// Extra query parameters, validated against the endpoint allow-list
    pub params: Vec<(String, String)>,
    /// Result-count guard for offset-mode pagination
    pub max_results: u64,
    /// Page size override; defaults to the view's maximum
    pub page_size: Option<u64>,
    /// When false, only the probe request runs and no results download
    pub download: bool,
    /// Cursor-mode override; defaults to the endpoint's capability
    pub cursor: Option<bool>,
    pub refresh: RefreshPolicy,
}

impl SearchRequest {
    pub fn new(endpoint: Endpoint, query: impl Into<String>) -> Self {
        Self {
            endpoint,
            view: View::default(),
            query: query.into(),
            params: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            page_size: None,
            download: true,
            cursor: None,
            refresh: RefreshPolicy::default(),
        }
    }

    pub fn view(mut self, view: View) -> Self {
        self.view = view;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn max_results(mut self, max: u64) -> Self {
        self.max_results = max;
        self
    }

    pub fn page_size(mut self, count: u64) -> Self {
        self.page_size = Some(count);
        self
    }

    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    pub fn cursor(mut self, cursor: bool) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    /// Canonical form of the query parameters that define the result
    /// set: everything except pagination keys, sorted, `k=v` joined with
    /// `&`. Two structurally identical searches canonicalize equally.
    pub fn canonical_query(&self) -> String {
        let mut pairs: Vec<(String, String)> = vec![
            ("query".to_string(), self.query.clone()),
            ("view".to_string(), self.view.as_str().to_string()),
        ];
        pairs.extend(self.params.iter().cloned());
        pairs.sort();
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Outcome of a search: the total the service reported plus the
/// downloaded entries (empty when `download` was off).
#[derive(Debug)]
pub struct SearchResults {
    pub entries: Vec<Value>,
    total: u64,
    pub from_cache: bool,
}

impl SearchResults {
    /// Total result count, available even when nothing was downloaded.
    pub fn result_count(&self) -> u64 {
        self.total
    }
}

/// One page of the search envelope.
struct Page {
    total: u64,
    entries: Vec<Value>,
    next_cursor: Option<String>,
}

/// Run a search, honoring the cache and the refresh policy.
pub(crate) async fn fetch(
    fetcher: &HttpFetcher,
    cache: &CacheStore,
    base_url: &str,
    request: &SearchRequest,
) -> Result<SearchResults> {
    if request.endpoint.kind() != EndpointKind::Search {
        return Err(Error::InvalidInput {
            field: "endpoint".to_string(),
            reason: format!("{} is not a search endpoint", request.endpoint.name()),
        });
    }
    request.endpoint.check_params(&request.params)?;

    let api = request.endpoint.name();
    let view = request.view.as_str();
    let path = cache.search_path(api, view, &request.canonical_query());

    if !cache.is_stale(&path, request.refresh) {
        match cache.load_paginated(&path).await {
            Ok(entries) => {
                let total = entries.len() as u64;
                return Ok(SearchResults {
                    entries,
                    total,
                    from_cache: true,
                });
            }
            // Unreadable cache file: treat as stale and re-download
            Err(e) => warn!(
                "Discarding unreadable cache file {}: {}",
                path.display(),
                e
            ),
        }
    }

    let use_cursor = request.cursor.unwrap_or(request.endpoint.supports_cursor());
    let count = request.page_size.unwrap_or(request.view.page_size()).max(1);
    let url = request.endpoint.search_url(base_url)?;

    let base_params = {
        let mut pairs = vec![
            ("query".to_string(), request.query.clone()),
            ("view".to_string(), view.to_string()),
            ("count".to_string(), count.to_string()),
        ];
        pairs.extend(request.params.iter().cloned());
        pairs
    };
    let page_params = |page_key: &str, page_value: String| {
        let mut pairs = base_params.clone();
        pairs.push((page_key.to_string(), page_value));
        pairs
    };

    // The first page doubles as the total-count probe
    let probe_params = if use_cursor {
        page_params("cursor", "*".to_string())
    } else {
        page_params("start", "0".to_string())
    };
    let probe = fetcher.get(&url, api, &probe_params).await?;
    let first = parse_page(&probe.body)?;
    let total = first.total;

    if total == 0 {
        debug!("Search '{}' matched nothing", request.query);
        cache.save_paginated(&path, &[]).await?;
        return Ok(SearchResults {
            entries: Vec::new(),
            total: 0,
            from_cache: false,
        });
    }

    // Offset iteration is capped; cursor iteration is not
    if !use_cursor && total > request.max_results {
        return Err(Error::QueryTooLarge {
            total,
            max: request.max_results,
        });
    }

    if !request.download {
        return Ok(SearchResults {
            entries: Vec::new(),
            total,
            from_cache: false,
        });
    }

    // The remaining count decreases by `count` per request and is not
    // re-read from later responses, so a total drifting server-side
    // cannot extend a long-running download.
    let mut entries = first.entries;
    let mut next_cursor = first.next_cursor;
    let mut remaining = total as i64 - count as i64;
    let mut start = count;

    while remaining > 0 {
        let params = if use_cursor {
            match next_cursor.take() {
                Some(token) => page_params("cursor", token),
                None => {
                    warn!(
                        "Search '{}' ended early: no continuation cursor with {} results outstanding",
                        request.query, remaining
                    );
                    break;
                }
            }
        } else {
            page_params("start", start.to_string())
        };

        let response = fetcher.get(&url, api, &params).await?;
        let page = parse_page(&response.body)?;

        if page.entries.is_empty() {
            warn!(
                "Search '{}' ended early: empty page with {} results outstanding",
                request.query, remaining
            );
            break;
        }

        entries.extend(page.entries);
        next_cursor = page.next_cursor;
        remaining -= count as i64;
        start += count;
        debug!(
            "Search '{}': {}/{} entries collected",
            request.query,
            entries.len(),
            total
        );
    }

    cache.save_paginated(&path, &entries).await?;
    Ok(SearchResults {
        entries,
        total,
        from_cache: false,
    })
}

/// Decode one `search-results` envelope.
fn parse_page(body: &Value) -> Result<Page> {
    let results = body
        .get("search-results")
        .ok_or_else(|| serde_json::Error::custom("response lacks a search-results envelope"))?;

    let total = match results.get("opensearch:totalResults") {
        Some(Value::String(s)) => s.parse::<u64>().map_err(|_| {
            serde_json::Error::custom(format!("opensearch:totalResults is not numeric: {s:?}"))
        })?,
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => {
            return Err(
                serde_json::Error::custom("response lacks opensearch:totalResults").into(),
            )
        }
    };

    // A zero-total response carries a placeholder entry; ignore it.
    let entries = if total == 0 {
        Vec::new()
    } else {
        results
            .get("entry")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    let next_cursor = results
        .pointer("/cursor/@next")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Page {
        total,
        entries,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_query_is_order_insensitive() {
        let a = SearchRequest::new(Endpoint::ScopusSearch, "AU-ID(123)")
            .param("date", "2019-2021")
            .param("subj", "MEDI");
        let b = SearchRequest::new(Endpoint::ScopusSearch, "AU-ID(123)")
            .param("subj", "MEDI")
            .param("date", "2019-2021");
        assert_eq!(a.canonical_query(), b.canonical_query());

        let c = SearchRequest::new(Endpoint::ScopusSearch, "AU-ID(456)");
        assert_ne!(a.canonical_query(), c.canonical_query());
    }

    #[test]
    fn envelope_total_parses_string_and_number() {
        let page = parse_page(&json!({
            "search-results": {"opensearch:totalResults": "42", "entry": [{"eid": "1"}]}
        }))
        .unwrap();
        assert_eq!(page.total, 42);
        assert_eq!(page.entries.len(), 1);

        let page = parse_page(&json!({
            "search-results": {"opensearch:totalResults": 7, "entry": []}
        }))
        .unwrap();
        assert_eq!(page.total, 7);
    }

    #[test]
    fn zero_total_discards_placeholder_entry() {
        let page = parse_page(&json!({
            "search-results": {
                "opensearch:totalResults": "0",
                "entry": [{"error": "Result set was empty"}]
            }
        }))
        .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn cursor_token_is_extracted() {
        let page = parse_page(&json!({
            "search-results": {
                "opensearch:totalResults": "100",
                "cursor": {"@next": "AoE2kA=="},
                "entry": [{"eid": "1"}]
            }
        }))
        .unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("AoE2kA=="));
    }

    #[test]
    fn malformed_envelope_is_an_error() {
        assert!(parse_page(&json!({"unexpected": true})).is_err());
        assert!(parse_page(&json!({"search-results": {}})).is_err());
    }
}
