//! # API descriptors
//!
//! Static descriptions of the wrapped REST endpoints: URL paths, cache
//! directory names, pagination mode, documented throttle limits and the
//! query parameters each endpoint recognizes. Endpoint-specific response
//! mapping lives with the callers; the core only needs these identities.

use crate::{Error, Result};
use url::Url;

/// One wrapped API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AbstractRetrieval,
    ArticleRetrieval,
    AuthorRetrieval,
    AffiliationRetrieval,
    ScopusSearch,
    ScienceDirectSearch,
    AuthorSearch,
    AffiliationSearch,
}

/// Whether an endpoint returns one document or a paginated result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Retrieval,
    Search,
}

impl Endpoint {
    /// Every wrapped endpoint, for building per-API tables.
    pub fn all() -> [Endpoint; 8] {
        [
            Endpoint::AbstractRetrieval,
            Endpoint::ArticleRetrieval,
            Endpoint::AuthorRetrieval,
            Endpoint::AffiliationRetrieval,
            Endpoint::ScopusSearch,
            Endpoint::ScienceDirectSearch,
            Endpoint::AuthorSearch,
            Endpoint::AffiliationSearch,
        ]
    }

    /// Stable name, used as cache directory segment and throttle key.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::AbstractRetrieval => "abstract-retrieval",
            Endpoint::ArticleRetrieval => "article-retrieval",
            Endpoint::AuthorRetrieval => "author-retrieval",
            Endpoint::AffiliationRetrieval => "affiliation-retrieval",
            Endpoint::ScopusSearch => "scopus-search",
            Endpoint::ScienceDirectSearch => "sciencedirect-search",
            Endpoint::AuthorSearch => "author-search",
            Endpoint::AffiliationSearch => "affiliation-search",
        }
    }

    pub fn kind(self) -> EndpointKind {
        match self {
            Endpoint::AbstractRetrieval
            | Endpoint::ArticleRetrieval
            | Endpoint::AuthorRetrieval
            | Endpoint::AffiliationRetrieval => EndpointKind::Retrieval,
            Endpoint::ScopusSearch
            | Endpoint::ScienceDirectSearch
            | Endpoint::AuthorSearch
            | Endpoint::AffiliationSearch => EndpointKind::Search,
        }
    }

    /// URL path under the API host, without identifier segments.
    fn base_path(self) -> &'static str {
        match self {
            Endpoint::AbstractRetrieval => "content/abstract",
            Endpoint::ArticleRetrieval => "content/article",
            Endpoint::AuthorRetrieval => "content/author",
            Endpoint::AffiliationRetrieval => "content/affiliation",
            Endpoint::ScopusSearch => "content/search/scopus",
            Endpoint::ScienceDirectSearch => "content/search/sciencedirect",
            Endpoint::AuthorSearch => "content/search/author",
            Endpoint::AffiliationSearch => "content/search/affiliation",
        }
    }

    /// Documented requests-per-second limit for this endpoint.
    pub fn default_rate_limit(self) -> u32 {
        match self {
            Endpoint::AbstractRetrieval => 9,
            Endpoint::ArticleRetrieval => 10,
            Endpoint::AuthorRetrieval => 3,
            Endpoint::AffiliationRetrieval => 6,
            Endpoint::ScopusSearch => 9,
            Endpoint::ScienceDirectSearch => 2,
            Endpoint::AuthorSearch => 3,
            Endpoint::AffiliationSearch => 6,
        }
    }

    /// Cursor-based iteration support (subscriber feature, unbounded
    /// result sets). Offset-capped endpoints return false.
    pub fn supports_cursor(self) -> bool {
        matches!(
            self,
            Endpoint::ScopusSearch | Endpoint::ScienceDirectSearch
        )
    }

    /// Identifier type used when the caller does not specify one.
    pub fn default_id_type(self) -> IdType {
        match self {
            Endpoint::AbstractRetrieval => IdType::ScopusId,
            Endpoint::ArticleRetrieval => IdType::Doi,
            Endpoint::AuthorRetrieval => IdType::AuthorId,
            Endpoint::AffiliationRetrieval => IdType::AffiliationId,
            _ => IdType::ScopusId,
        }
    }

    /// Query parameters this endpoint recognizes beyond the ones the core
    /// itself manages (`view`, `query`, `count`, `start`, `cursor`).
    pub fn allowed_params(self) -> &'static [&'static str] {
        match self.kind() {
            EndpointKind::Retrieval => &["field", "date", "startref", "refcount"],
            EndpointKind::Search => &["field", "date", "subj", "content", "suppressNavLinks", "sort"],
        }
    }

    /// Reject caller-supplied parameters this endpoint does not recognize.
    pub fn check_params(self, params: &[(String, String)]) -> Result<()> {
        for (name, _) in params {
            if !self.allowed_params().contains(&name.as_str()) {
                return Err(Error::InvalidInput {
                    field: name.clone(),
                    reason: format!("parameter not recognized by {}", self.name()),
                });
            }
        }
        Ok(())
    }

    /// Build the request URL for a single-resource retrieval.
    pub fn retrieval_url(self, base_url: &str, id_type: IdType, identifier: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.base_path(),
            id_type.as_str(),
            urlencoding::encode(identifier)
        );
        Url::parse(&raw).map_err(|e| Error::InvalidInput {
            field: "identifier".to_string(),
            reason: format!("cannot build request URL: {e}"),
        })
    }

    /// Build the request URL for a search, before query parameters.
    pub fn search_url(self, base_url: &str) -> Result<Url> {
        let raw = format!("{}/{}", base_url.trim_end_matches('/'), self.base_path());
        Url::parse(&raw).map_err(|e| Error::InvalidConfig {
            reason: format!("cannot build search URL from base {base_url}: {e}"),
        })
    }
}

/// Identifier namespaces accepted by the retrieval endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    ScopusId,
    Eid,
    Doi,
    Pii,
    PubmedId,
    AuthorId,
    AffiliationId,
}

impl IdType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdType::ScopusId => "scopus_id",
            IdType::Eid => "eid",
            IdType::Doi => "doi",
            IdType::Pii => "pii",
            IdType::PubmedId => "pubmed_id",
            IdType::AuthorId => "author_id",
            IdType::AffiliationId => "affiliation_id",
        }
    }
}

/// Named response-shape variant of an endpoint.
///
/// The view controls which fields the service returns and the maximum
/// page size a search may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    Meta,
    MetaAbs,
    #[default]
    Standard,
    Complete,
    Full,
    Enhanced,
    Light,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Meta => "META",
            View::MetaAbs => "META_ABS",
            View::Standard => "STANDARD",
            View::Complete => "COMPLETE",
            View::Full => "FULL",
            View::Enhanced => "ENHANCED",
            View::Light => "LIGHT",
        }
    }

    /// Maximum search page size the service accepts for this view.
    pub fn page_size(self) -> u64 {
        match self {
            View::Complete | View::Full | View::Enhanced => 25,
            _ => 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_url_shape() {
        let url = Endpoint::AbstractRetrieval
            .retrieval_url("https://api.elsevier.com", IdType::ScopusId, "85012345678")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.elsevier.com/content/abstract/scopus_id/85012345678"
        );
    }

    #[test]
    fn retrieval_url_escapes_identifier() {
        let url = Endpoint::ArticleRetrieval
            .retrieval_url("https://api.elsevier.com", IdType::Doi, "10.1016/j.softx.2019.100263")
            .unwrap();
        assert!(url.path().contains("10.1016%2Fj.softx.2019.100263"));
    }

    #[test]
    fn cursor_support_is_limited_to_subscriber_searches() {
        assert!(Endpoint::ScopusSearch.supports_cursor());
        assert!(Endpoint::ScienceDirectSearch.supports_cursor());
        assert!(!Endpoint::AuthorSearch.supports_cursor());
        assert!(!Endpoint::AbstractRetrieval.supports_cursor());
    }

    #[test]
    fn unknown_params_are_rejected() {
        let params = vec![("frobnicate".to_string(), "1".to_string())];
        assert!(matches!(
            Endpoint::ScopusSearch.check_params(&params),
            Err(Error::InvalidInput { .. })
        ));

        let params = vec![("date".to_string(), "2019-2021".to_string())];
        assert!(Endpoint::ScopusSearch.check_params(&params).is_ok());
    }

    #[test]
    fn complete_views_use_small_pages() {
        assert_eq!(View::Complete.page_size(), 25);
        assert_eq!(View::Standard.page_size(), 200);
    }
}
