use thiserror::Error;

/// Error taxonomy for the client core.
///
/// HTTP status codes the Elsevier APIs document are mapped 1:1 onto
/// variants so callers can branch on the cause rather than re-parse a
/// status code. Each status variant carries the server-provided message
/// when the error body was parseable JSON, and an empty string otherwise.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent failures)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("No API credentials configured")]
    MissingCredentials,

    // Caller errors (permanent - don't retry)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // Credential rotation exhausted every configured key
    #[error("All {attempts} credentials failed, last HTTP {last_status}: {message}")]
    AuthExhausted {
        attempts: usize,
        last_status: u16,
        message: String,
    },

    // One variant per documented non-2xx status the APIs return
    #[error("Bad request (HTTP 400): {message}")]
    BadRequest { message: String },

    #[error("Unauthorized (HTTP 401): {message}")]
    Unauthorized { message: String },

    #[error("Forbidden (HTTP 403): {message}")]
    Forbidden { message: String },

    #[error("Not found (HTTP 404): {message}")]
    NotFound { message: String },

    #[error("Proxy authentication required (HTTP 407): {message}")]
    ProxyAuthRequired { message: String },

    #[error("Payload too large (HTTP 413): {message}")]
    PayloadTooLarge { message: String },

    #[error("URI too long (HTTP 414): {message}")]
    UriTooLong { message: String },

    #[error("Too many requests (HTTP 429): {message}")]
    TooManyRequests { message: String },

    #[error("Unexpected HTTP status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    // Result-count guard for offset-paginated searches
    #[error("Query matched {total} results, exceeding the maximum of {max}")]
    QueryTooLarge { total: u64, max: u64 },

    // Network-level failures, including 5xx after the retry budget
    #[error("Transport error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    // I/O and serialization around the cache
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Error categorization for retry strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - handled by credential rotation, not transport retry
    RateLimited,
}

impl Error {
    /// Categorize error for retry logic
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport { .. } => ErrorCategory::Transient,
            Error::TooManyRequests { .. } => ErrorCategory::RateLimited,
            _ => ErrorCategory::Permanent,
        }
    }

    /// Check if the transport layer may retry this error
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Map a non-2xx HTTP status onto its error variant.
    ///
    /// `message` is the server's explanation extracted from the JSON error
    /// body (empty when the body was not JSON or lacked the field).
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => Error::BadRequest { message },
            401 => Error::Unauthorized { message },
            403 => Error::Forbidden { message },
            404 => Error::NotFound { message },
            407 => Error::ProxyAuthRequired { message },
            413 => Error::PayloadTooLarge { message },
            414 => Error::UriTooLong { message },
            429 => Error::TooManyRequests { message },
            _ => Error::UnexpectedStatus { status, message },
        }
    }

    /// The HTTP status behind this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::BadRequest { .. } => Some(400),
            Error::Unauthorized { .. } => Some(401),
            Error::Forbidden { .. } => Some(403),
            Error::NotFound { .. } => Some(404),
            Error::ProxyAuthRequired { .. } => Some(407),
            Error::PayloadTooLarge { .. } => Some(413),
            Error::UriTooLong { .. } => Some(414),
            Error::TooManyRequests { .. } => Some(429),
            Error::UnexpectedStatus { status, .. } => Some(*status),
            Error::AuthExhausted { last_status, .. } => Some(*last_status),
            Error::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
