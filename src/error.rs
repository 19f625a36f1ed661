//! Unified error model for the credential, session and object layers.
//! Every operation returns one of these variants; the HTTP layer is the only place
//! that turns them into status codes and response envelopes.

use thiserror::Error;

/// Failures raised by a [`KvBackend`](crate::storage::KvBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("namespace {0:?} not found")]
    NamespaceNotFound(String),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid password for {0:?}")]
    InvalidCredential(String),
    #[error("user {0:?} not logged in")]
    NotLoggedIn(String),
    #[error("bad key for user {0:?}")]
    BadToken(String),
    #[error("user {0:?} timed out")]
    TimedOut(String),
    #[error("user {0:?} not authorized")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("stored record: {0}")]
    Codec(#[from] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::AlreadyExists(_) => "already_exists",
            AuthError::NotFound(_) => "not_found",
            AuthError::InvalidCredential(_) => "invalid_credential",
            AuthError::NotLoggedIn(_) => "not_logged_in",
            AuthError::BadToken(_) => "bad_token",
            AuthError::TimedOut(_) => "timed_out",
            AuthError::Unauthorized(_) => "unauthorized",
            AuthError::BadRequest(_) => "bad_request",
            AuthError::Codec(_) => "codec_error",
            AuthError::Backend(_) => "backend_error",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::AlreadyExists(_) => 409,
            AuthError::NotFound(_) => 404,
            AuthError::InvalidCredential(_)
            | AuthError::NotLoggedIn(_)
            | AuthError::BadToken(_)
            | AuthError::TimedOut(_) => 401,
            AuthError::Unauthorized(_) => 403,
            AuthError::BadRequest(_) => 400,
            AuthError::Codec(_) | AuthError::Backend(_) => 500,
        }
    }

    /// True for the session failures a caller can only fix by logging in again.
    pub fn is_session_failure(&self) -> bool {
        matches!(self, AuthError::NotLoggedIn(_) | AuthError::BadToken(_) | AuthError::TimedOut(_))
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
