//! Authentication subsystem: credential storage, password hashing,
//! two-step login with TOTP, sessions, and CSRF protection.

mod credentials;
mod error;
mod flow;
mod password;
mod session;
mod totp;

pub use credentials::{
    Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore, DEFAULT_USERNAME,
};
pub use error::{AuthError, StorageError};
pub use flow::{AuthFlow, EnrollmentStart, LoginStep};
pub use password::{hash_password, verify_password};
pub use session::{
    SessionAuth, SessionStore, DEFAULT_SESSION_TTL_SECONDS, SESSION_COOKIE_NAME,
};
pub use totp::TotpEngine;
