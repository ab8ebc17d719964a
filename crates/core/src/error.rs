//! Error model shared by upstream fetchers and the query layer.

use thiserror::Error;

/// Result type used by the query resolution layer.
pub type QueryResult<T> = Result<T, QueryError>;

/// Failure of a single upstream request.
///
/// Fetchers report what happened on the wire; whether it is worth trying again
/// is answered by [`FetchError::is_retryable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The requested resource does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request never produced a response (connect/reset/timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn status(status: u16, msg: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Transient failures: connection problems and 5xx answers.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::NotFound(_) | FetchError::Decode(_) => false,
        }
    }
}

/// Error surfaced to query subscribers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed caller input (e.g. a missing required identifier).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A single-entity query named something that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The upstream fetch failed after its retry budget was exhausted.
    #[error("transport error: {0}")]
    Transport(String),
}

impl QueryError {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl From<FetchError> for QueryError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(what) => QueryError::NotFound(what),
            other => QueryError::Transport(other.to_string()),
        }
    }
}
