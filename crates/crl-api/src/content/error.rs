//! `ContentApiError` - failures of a single content API request.

use std::sync::Arc;

use thiserror::Error;

/// Error returned by the typed content API operations.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ContentApiError {
    /// The transport gave up waiting for the server.
    #[error("request timed out: {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The server answered with a non-success HTTP status.
    #[error(transparent)]
    Status(reqwest::Error),

    /// Any other transport failure (connect, TLS, body read).
    #[error(transparent)]
    Request(reqwest::Error),

    /// The response body is not valid JSON.
    #[error("failed to decode JSON response from {url}: {source}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The endpoint URL could not be built.
    #[error("failed to join URL path: {path}")]
    Url {
        /// Path that was joined onto the API root.
        path: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// An event date field could not be parsed.
    #[error("invalid {field} date {value:?}: {source}")]
    Date {
        /// Field name (`nearest` or `latest`).
        field: &'static str,
        /// Raw value received from the API.
        value: String,
        /// Underlying parse error.
        #[source]
        source: chrono::ParseError,
    },

    /// A failure handed to several callers waiting on the same cached request.
    #[error(transparent)]
    Shared(Arc<ContentApiError>),
}

impl ContentApiError {
    /// Classifies a `reqwest` error into timeout, status or generic transport failure.
    pub(crate) fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: String::from(url),
            }
        } else if err.is_status() {
            Self::Status(err)
        } else {
            Self::Request(err)
        }
    }

    /// Takes the error back out of the cache's `Arc`, or keeps it shared
    /// when other callers still hold it.
    pub(crate) fn from_shared(err: Arc<Self>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(Self::Shared)
    }

    /// Returns `true` if the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Shared(inner) => inner.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if the server answered with an error status.
    #[must_use]
    pub fn is_status(&self) -> bool {
        match self {
            Self::Status(_) => true,
            Self::Shared(inner) => inner.is_status(),
            _ => false,
        }
    }

    /// HTTP status code, when the failure carries one.
    #[must_use]
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Status(err) | Self::Request(err) => err.status(),
            Self::Shared(inner) => inner.status(),
            _ => None,
        }
    }
}
