use thiserror::Error;

use flockdesk_auth::GrantValidationError;

/// Errors surfaced by the session subsystem.
///
/// `Clone` because a single renewal outcome is shared by every caller that
/// joined it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Transport-level failure reaching the backend. Never retried here.
    #[error("network error: {0}")]
    Network(String),

    /// Login rejected by the server.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// A guarded request reported the credential as invalid and could not
    /// be retried.
    #[error("credential rejected by server")]
    CredentialRejected,

    /// The session could not be recovered; callers redirect to login.
    #[error("session expired")]
    SessionExpired,

    #[error("API error ({0}): {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid credential grant: {0}")]
    InvalidGrant(#[from] GrantValidationError),

    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl SessionError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, SessionError::SessionExpired)
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SessionError::Parse(err.to_string())
        } else {
            SessionError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Persisted state exists but is incomplete or unparsable.
    #[error("malformed persisted session: {0}")]
    Malformed(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
