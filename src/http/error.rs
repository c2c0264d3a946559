use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("Giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP client is closed, cannot GET {0}")]
    Closed(String),

    /// Failure of a memoized fetch that several callers were waiting on
    #[error(transparent)]
    Shared(Arc<HttpError>),
}

impl HttpError {
    /// Status code of a non-retried client error
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Shared(inner) => inner.status(),
            _ => None,
        }
    }

    /// Take back ownership of an error handed out by the memo cache.
    ///
    /// Variants without a foreign source are rebuilt so callers can still
    /// match on them; the rest stay behind [`HttpError::Shared`].
    pub(crate) fn from_shared(shared: Arc<HttpError>) -> HttpError {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| match shared.as_ref() {
            HttpError::InvalidUrl { url, reason } => HttpError::InvalidUrl {
                url: url.clone(),
                reason: reason.clone(),
            },
            HttpError::Status { url, status } => HttpError::Status {
                url: url.clone(),
                status: *status,
            },
            HttpError::RetriesExhausted {
                url,
                attempts,
                last_error,
            } => HttpError::RetriesExhausted {
                url: url.clone(),
                attempts: *attempts,
                last_error: last_error.clone(),
            },
            HttpError::Closed(url) => HttpError::Closed(url.clone()),
            _ => HttpError::Shared(shared),
        })
    }
}
