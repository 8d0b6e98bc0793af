//! # On-disk response cache
//!
//! Layout: `{root}/{api}/{view}/{stem}` where the stem is the sanitized
//! identifier for retrievals and an MD5 hex digest of the canonicalized
//! query for searches. Retrieval files hold one JSON document; search
//! files hold newline-delimited JSON, one entry per line. Writes go to a
//! temp file in the same directory and are renamed into place, so a
//! concurrent reader never observes a half-written file.

use crate::config::DirectoriesConfig;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rule governing whether a cached response is reused or re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Never refresh while a cache file exists
    #[default]
    Never,
    /// Always refresh, ignoring any cached file
    Always,
    /// Refresh when the file age in days exceeds the given number
    MaxAgeDays(u32),
}

impl RefreshPolicy {
    /// Pure policy evaluation against a file age in days.
    pub fn requires_refresh(self, age_days: u64) -> bool {
        match self {
            RefreshPolicy::Never => false,
            RefreshPolicy::Always => true,
            RefreshPolicy::MaxAgeDays(max) => age_days > u64::from(max),
        }
    }
}

/// File age in whole days, rounded up.
pub fn age_in_days(now: DateTime<Utc>, mtime: DateTime<Utc>) -> u64 {
    let secs = (now - mtime).num_seconds().max(0) as u64;
    (secs + 86_399) / 86_400
}

/// Maps cache keys to file paths and moves JSON payloads in and out.
#[derive(Debug, Clone)]
pub struct CacheStore {
    directories: DirectoriesConfig,
}

impl CacheStore {
    pub fn new(directories: DirectoriesConfig) -> Self {
        Self { directories }
    }

    fn root_for(&self, api: &str) -> PathBuf {
        self.directories
            .overrides
            .get(api)
            .cloned()
            .unwrap_or_else(|| self.directories.cache_root.join(api))
    }

    /// Cache path for a single-resource retrieval.
    pub fn retrieval_path(&self, api: &str, view: &str, identifier: &str) -> PathBuf {
        self.root_for(api)
            .join(view)
            .join(sanitize_identifier(identifier))
    }

    /// Cache path for a search, derived from the canonicalized query so
    /// structurally identical queries collide to the same file.
    pub fn search_path(&self, api: &str, view: &str, canonical_query: &str) -> PathBuf {
        let digest = md5::compute(canonical_query.as_bytes());
        self.root_for(api).join(view).join(format!("{digest:x}"))
    }

    /// Whether the file at `path` must be refreshed under `policy`.
    ///
    /// A missing file is always stale. An unreadable mtime is treated as
    /// age zero rather than an error.
    pub fn is_stale(&self, path: &Path, policy: RefreshPolicy) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return true;
        };
        let age = metadata
            .modified()
            .map(|mtime| age_in_days(Utc::now(), DateTime::<Utc>::from(mtime)))
            .unwrap_or(0);
        policy.requires_refresh(age)
    }

    /// Read a whole-file JSON document.
    pub async fn load_single(&self, path: &Path) -> Result<Value> {
        let bytes = tokio::fs::read(path).await?;
        let value = serde_json::from_slice(&bytes)?;
        debug!("Cache hit: {}", path.display());
        Ok(value)
    }

    /// Read newline-delimited JSON, one record per line, skipping blanks.
    pub async fn load_paginated(&self, path: &Path) -> Result<Vec<Value>> {
        let text = tokio::fs::read_to_string(path).await?;
        let mut entries = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        debug!("Cache hit: {} ({} entries)", path.display(), entries.len());
        Ok(entries)
    }

    /// Persist a single JSON document.
    pub async fn save_single(&self, path: &Path, value: &Value) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.write_atomic(path, &payload).await
    }

    /// Persist a result list as newline-delimited JSON.
    pub async fn save_paginated(&self, path: &Path, entries: &[Value]) -> Result<()> {
        let mut payload = Vec::new();
        for entry in entries {
            payload.extend_from_slice(&serde_json::to_vec(entry)?);
            payload.push(b'\n');
        }
        self.write_atomic(path, &payload).await
    }

    async fn write_atomic(&self, path: &Path, payload: &[u8]) -> Result<()> {
        let parent = path.parent().ok_or_else(|| Error::InvalidInput {
            field: "path".to_string(),
            reason: format!("cache path {} has no parent directory", path.display()),
        })?;
        tokio::fs::create_dir_all(parent).await?;

        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, payload).await?;
        tokio::fs::rename(&temp, path).await?;
        debug!("Cached {} bytes at {}", payload.len(), path.display());
        Ok(())
    }
}

/// Identifiers may contain `/` (DOIs, PIIs); it is the path separator, so
/// replace it before using the identifier as a file stem.
fn sanitize_identifier(identifier: &str) -> String {
    identifier.replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;

    fn store(root: &Path) -> CacheStore {
        CacheStore::new(DirectoriesConfig {
            cache_root: root.to_path_buf(),
            overrides: HashMap::new(),
        })
    }

    #[test]
    fn policy_table() {
        // file mtime 5 days old
        assert!(RefreshPolicy::MaxAgeDays(3).requires_refresh(5));
        assert!(!RefreshPolicy::MaxAgeDays(10).requires_refresh(5));
        assert!(RefreshPolicy::Always.requires_refresh(5));
        assert!(!RefreshPolicy::Never.requires_refresh(5));
        // boundary: age equal to the limit is not yet stale
        assert!(!RefreshPolicy::MaxAgeDays(5).requires_refresh(5));
        assert!(RefreshPolicy::MaxAgeDays(5).requires_refresh(6));
    }

    #[test]
    fn age_rounds_up_to_whole_days() {
        let mtime = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap();
        assert_eq!(age_in_days(now, mtime), 1);

        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(age_in_days(now, mtime), 1);

        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 1).unwrap();
        assert_eq!(age_in_days(now, mtime), 2);

        assert_eq!(age_in_days(mtime, mtime), 0);
    }

    #[test]
    fn missing_file_is_always_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = dir.path().join("nope");
        assert!(store.is_stale(&path, RefreshPolicy::Never));
    }

    #[test]
    fn fresh_file_is_not_stale_under_never_or_day_policies() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = dir.path().join("cached");
        std::fs::write(&path, b"{}").unwrap();

        assert!(!store.is_stale(&path, RefreshPolicy::Never));
        assert!(!store.is_stale(&path, RefreshPolicy::MaxAgeDays(3)));
        assert!(store.is_stale(&path, RefreshPolicy::Always));
    }

    #[test]
    fn identifier_slashes_become_underscores() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.retrieval_path("article-retrieval", "FULL", "10.1016/j.softx.2019.100263");
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .contains("10.1016_j.softx.2019.100263"));
    }

    #[test]
    fn identical_queries_share_a_path_and_distinct_ones_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let a = store.search_path("scopus-search", "STANDARD", "query=AU-ID(123)&view=STANDARD");
        let b = store.search_path("scopus-search", "STANDARD", "query=AU-ID(123)&view=STANDARD");
        let c = store.search_path("scopus-search", "STANDARD", "query=AU-ID(456)&view=STANDARD");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn single_document_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.retrieval_path("abstract-retrieval", "META", "85012345678");

        let doc = json!({"abstracts-retrieval-response": {"coredata": {"dc:title": "A title"}}});
        store.save_single(&path, &doc).await.unwrap();
        let loaded = store.load_single(&path).await.unwrap();
        assert_eq!(loaded, doc);

        // no temp file left behind
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn paginated_roundtrip_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.search_path("scopus-search", "STANDARD", "query=x");

        let entries = vec![json!({"eid": "1"}), json!({"eid": "2"})];
        store.save_paginated(&path, &entries).await.unwrap();

        // append a blank line, as a trailing newline or manual edit would
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push('\n');
        std::fs::write(&path, text).unwrap();

        let loaded = store.load_paginated(&path).await.unwrap();
        assert_eq!(loaded, entries);
    }

    #[tokio::test]
    async fn empty_result_set_persists_as_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.search_path("scopus-search", "STANDARD", "query=none");

        store.save_paginated(&path, &[]).await.unwrap();
        assert!(path.exists());
        assert!(store.load_paginated(&path).await.unwrap().is_empty());
    }
}
