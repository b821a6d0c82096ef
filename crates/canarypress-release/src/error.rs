//! Error types for release operations.

use thiserror::Error;

use canarypress_api::ApiError;

/// Result type alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Errors surfaced by the reconciler.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Backend fetch or parse failure. Recoverable: the caller keeps stale
    /// state and lets the next poll tick try again.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The fetched release group carries no routing constraints, so there is
    /// no current version to reconcile against.
    #[error("release group {0} has no routing constraints")]
    EmptyRuleSet(String),

    /// A push was attempted before any release group had been fetched.
    #[error("no release group fetched yet")]
    NotSynchronized,
}
