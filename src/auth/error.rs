//! Error taxonomy for the authentication core.

use thiserror::Error;

/// Failure to read or write the persisted credential record.
///
/// These are hard failures: the request that triggered them is rejected and
/// the system is never left in a partially written state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("credential storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed credential record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("crypto operation failed: {0}")]
    Crypto(String),
}

/// Outcome of a rejected authentication transition.
///
/// No variant ever carries enough detail to distinguish which factor failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password mismatch, reported generically.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Wrong, expired, or missing TOTP code.
    #[error("invalid code")]
    InvalidSecondFactor,
    /// Missing or mismatched anti-forgery token; the action is rejected
    /// without mutating any state.
    #[error("csrf token mismatch")]
    CsrfMismatch,
    /// The session is not in the state the transition requires.
    #[error("not authenticated")]
    NotAuthenticated,
    /// 2FA confirmation was attempted with no enrollment in progress.
    #[error("no pending 2fa enrollment")]
    NoPendingEnrollment,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
