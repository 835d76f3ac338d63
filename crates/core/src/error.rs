//! Unified error types for cachestorage.
//!
//! Every variant carries a stable code prefix so callers on the MCP side can
//! tell failures apart without parsing free-form text.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error type for the cache registry, buckets and storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty cache name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A request handed to put/add/addAll is not a GET over http(s).
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    /// A fetched response was a network error, partial, or not 2xx.
    #[error("RESPONSE_ERROR: {0}")]
    ResponseError(String),

    /// A response carried `Vary: *` and can never be matched.
    #[error("INVALID_VARY_HEADER: {0}")]
    InvalidVaryHeader(String),

    /// A fetch was cancelled because a sibling fetch in the same batch failed.
    #[error("ABORTED: {0}")]
    Aborted(String),

    /// No bucket exists under the given name.
    #[error("CACHE_NOT_FOUND: {0}")]
    CacheNotFound(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored or supplied header list could not be encoded or decoded.
    #[error("INVALID_HEADERS: {0}")]
    InvalidHeaders(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network-level failure talking to the origin.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),
}

impl Error {
    /// Whether this error is the abort outcome of a cancelled fetch.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidRequest(msg) => (-32602, msg.clone()),
            Error::CacheNotFound(msg) => (-32001, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::InvalidHeaders(msg) => (-32004, msg.clone()),
            Error::InvalidVaryHeader(msg) => (-32005, msg.clone()),
            Error::Aborted(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::ResponseError(msg) => (-32008, msg.clone()),
            Error::Network(msg) => (-32008, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
