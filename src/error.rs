use thiserror::Error;

use crate::models::Notice;

/// AuthError
///
/// Every way the admin gate can refuse a session. None of these are fatal:
/// each one resolves to the same recovery (drop the session, go to login).
/// Only the two server rejections carry a user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no admin token present")]
    MissingToken,
    #[error("admin token is malformed")]
    MalformedToken,
    #[error("admin token has expired")]
    ExpiredToken,
    #[error("token role is not admin")]
    WrongRole,
    #[error("token signature could not be verified")]
    InvalidSignature,
    #[error("backend request failed: {0}")]
    NetworkFailure(String),
    #[error("backend request timed out")]
    Timeout,
    #[error("backend rejected the session with status {0}")]
    ServerRejected(u16),
    #[error("backend returned an unusable profile: {0}")]
    MalformedProfile(String),
}

impl AuthError {
    /// notice
    ///
    /// Maps the failure to the toast shown before redirecting, if any.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            AuthError::ServerRejected(401) => Some(Notice::SessionExpired),
            AuthError::ServerRejected(403) => Some(Notice::AccessDenied),
            _ => None,
        }
    }

    /// Whether the cookie/stored token should be discarded. A missing token has
    /// nothing to discard.
    pub fn clears_token(&self) -> bool {
        !matches!(self, AuthError::MissingToken)
    }
}
