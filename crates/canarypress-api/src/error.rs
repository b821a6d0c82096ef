//! Error types for backend API calls.

use thiserror::Error;

/// Result type alias for backend API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the backend client.
///
/// Both variants are recoverable at the poll-loop level: the caller keeps its
/// stale state and waits for the next tick. No retry or backoff happens here.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or came back non-2xx.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The response body did not match the expected contract.
    #[error("parse failed: {0}")]
    Parse(String),
}
