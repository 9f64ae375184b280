//! Client error types

use thiserror::Error;

use crate::store::StoreError;
use crate::token::TokenError;

/// Transport-level error raised by the HTTP layer
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Session-level error surfaced to the application.
///
/// Transport errors never cross the session boundary raw; they are folded
/// into this taxonomy. `Clone` because one refresh result is fanned out to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Token malformed, undecodable, or missing required claims
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// Login got tokens but could not establish what the user may do
    #[error("Permission resolution failed: {0}")]
    PermissionResolutionFailed(Box<SessionError>),

    /// Service refused access to a resource
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Service rejected the credentials or token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other transport or service failure
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Persisted session store could not be read or written
    #[error("Session storage error: {0}")]
    Storage(String),

    /// The session was signed out or replaced while the request was in flight
    #[error("Session changed while the request was in flight")]
    Superseded,
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Wraps a resolver failure as seen by `login`
    pub fn permission_resolution(cause: SessionError) -> Self {
        Self::PermissionResolutionFailed(Box::new(cause))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

impl From<ClientError> for SessionError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized(msg) => Self::Unauthorized(msg),
            ClientError::Forbidden(msg) => Self::Forbidden(msg),
            other => Self::NetworkFailure(other.to_string()),
        }
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        Self::InvalidToken(err.to_string())
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}
