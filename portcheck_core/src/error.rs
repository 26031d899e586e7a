//! Error types for the resolution engine
//!
//! Two layers: [`SourceError`] covers data-level failures of one external
//! source and never crosses the resolver boundary, while [`Error`] covers
//! storage and configuration defects, plus missed answer deadlines, that
//! legitimately surface to callers.

use thiserror::Error;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that cross the resolver boundary.
///
/// Data-level conditions (not-found, transient network failure) never use
/// this type; they resolve to fallback or negative entries instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Durable cache storage failed.
    #[error("cache storage error: {0}")]
    Cache(String),

    /// Deployment/wiring defect: bad configuration, unknown request tag,
    /// missing dependency. Surfaced immediately, never swallowed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload (de)serialization failed.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// The answer deadline elapsed before the request completed. The
    /// underlying work keeps running and its cache write still lands.
    #[error("request did not complete within {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Cache(err.to_string())
    }
}

/// Failure of a single external-source request.
///
/// Every variant is transient from the caching policy's point of view:
/// none of them produces a cache row, so the next lookup retries the
/// network. Only [`SourceError::RateLimited`] is retried in-flight by the
/// rate limiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// HTTP 429 equivalent; retried with backoff by the rate limiter.
    #[error("rate limited by source")]
    RateLimited,

    /// Non-rate-limit HTTP failure (5xx and friends).
    #[error("source returned http status {status}")]
    Http { status: u16 },

    /// Connection-level failure (DNS, refused, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The source answered with something we could not parse. Treated the
    /// same as a transient failure: logged, never cached.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Whether the rate limiter should retry this failure in-flight.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SourceError::RateLimited)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                SourceError::RateLimited
            } else {
                SourceError::Http {
                    status: status.as_u16(),
                }
            }
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}
