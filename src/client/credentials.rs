//! Credential rotation for multi-key quota fallback.
//!
//! The pool is an ordered queue: institutional-token credentials sort
//! ahead of plain keys at construction, and a credential that fails with
//! an auth-class status is demoted to the back. A successful request
//! leaves the order untouched, so the next request reuses the credential
//! that is known to work.

use crate::{Error, Result};
use tracing::debug;

/// One API credential: a key, optionally paired with an institutional token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub key: String,
    pub inst_token: Option<String>,
}

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            inst_token: None,
        }
    }

    pub fn with_token(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            inst_token: Some(token.into()),
        }
    }
}

/// Ordered rotation queue of credentials.
#[derive(Debug)]
pub struct CredentialPool {
    queue: Vec<Credential>,
}

impl CredentialPool {
    /// Build a pool, ordering institutional-token credentials first.
    pub fn new(credentials: Vec<Credential>) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::MissingCredentials);
        }
        let (with_token, plain): (Vec<_>, Vec<_>) = credentials
            .into_iter()
            .partition(|c| c.inst_token.is_some());
        let mut queue = with_token;
        queue.extend(plain);
        Ok(Self { queue })
    }

    /// The credential the next request should use.
    pub fn current(&self) -> &Credential {
        // new() guarantees a non-empty queue
        &self.queue[0]
    }

    /// Move the front credential to the back after an auth failure.
    pub fn demote(&mut self) {
        if self.queue.len() > 1 {
            let failed = self.queue.remove(0);
            debug!("Demoting credential ending …{}", key_suffix(&failed.key));
            self.queue.push(failed);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

fn key_suffix(key: &str) -> &str {
    let n = key.len();
    &key[n.saturating_sub(4)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_is_a_configuration_error() {
        assert!(matches!(
            CredentialPool::new(Vec::new()),
            Err(Error::MissingCredentials)
        ));
    }

    #[test]
    fn token_credentials_are_preferred() {
        let pool = CredentialPool::new(vec![
            Credential::new("plain"),
            Credential::with_token("tokened", "tok"),
        ])
        .unwrap();
        assert_eq!(pool.current().key, "tokened");
    }

    #[test]
    fn demote_rotates_to_back() {
        let mut pool = CredentialPool::new(vec![
            Credential::new("a"),
            Credential::new("b"),
            Credential::new("c"),
        ])
        .unwrap();

        assert_eq!(pool.current().key, "a");
        pool.demote();
        assert_eq!(pool.current().key, "b");
        pool.demote();
        assert_eq!(pool.current().key, "c");
        pool.demote();
        assert_eq!(pool.current().key, "a");
    }

    #[test]
    fn single_credential_demote_is_a_noop() {
        let mut pool = CredentialPool::new(vec![Credential::new("only")]).unwrap();
        pool.demote();
        assert_eq!(pool.current().key, "only");
    }
}
