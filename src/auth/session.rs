//! Server-side sessions keyed by an unguessable identifier.
//!
//! The cookie carries only `<id>.<signature>`: the identifier plus an
//! HMAC-SHA256 over it, so the server is the sole writer of session
//! contents. All semantic state (authenticated user, pending second
//! factor, CSRF token) lives in the in-memory map and expires after a
//! fixed idle lifetime. Expired or tampered cookies behave exactly like
//! absent ones.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE_NAME: &str = "flowgate_session";
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 3600;

// 256 bits of entropy for both identifiers and CSRF tokens.
const SESSION_ID_BYTES: usize = 32;
const CSRF_TOKEN_BYTES: usize = 32;

/// Authentication progress of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAuth {
    Anonymous,
    AwaitingSecondFactor { username: String },
    Authenticated { username: String },
}

struct SessionEntry {
    user: Option<String>,
    pending_user: Option<String>,
    csrf_token: Option<String>,
    last_seen: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            user: None,
            pending_user: None,
            csrf_token: None,
            last_seen: Instant::now(),
        }
    }
}

pub struct SessionStore {
    signing_key: SecretString,
    idle_ttl: Duration,
    cookie_secure: bool,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(signing_key: SecretString, idle_ttl: Duration, cookie_secure: bool) -> Self {
        Self {
            signing_key,
            idle_ttl,
            cookie_secure,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a fresh anonymous session and return its identifier.
    ///
    /// # Errors
    /// Returns an error if the system random source fails.
    pub async fn create(&self) -> Result<String> {
        let session_id = random_token(SESSION_ID_BYTES)?;
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| entry.last_seen.elapsed() < self.idle_ttl);
        sessions.insert(session_id.clone(), SessionEntry::new());
        Ok(session_id)
    }

    /// Resolve a presented cookie value to a live session identifier.
    ///
    /// Returns `None` for absent, tampered, unknown, or expired cookies;
    /// a successful resolve refreshes the idle timer.
    pub async fn resolve(&self, cookie_value: &str) -> Option<String> {
        let (session_id, signature) = cookie_value.rsplit_once('.')?;
        if !self.verify_signature(session_id, signature) {
            return None;
        }
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(session_id)?;
        if entry.last_seen.elapsed() >= self.idle_ttl {
            sessions.remove(session_id);
            return None;
        }
        entry.last_seen = Instant::now();
        Some(session_id.to_string())
    }

    /// Remove a session entirely; a replayed cookie for it is then
    /// indistinguishable from an anonymous request.
    pub async fn destroy(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }

    pub async fn auth_state(&self, session_id: &str) -> SessionAuth {
        let sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get(session_id) else {
            return SessionAuth::Anonymous;
        };
        if let Some(user) = &entry.user {
            return SessionAuth::Authenticated {
                username: user.clone(),
            };
        }
        if let Some(pending) = &entry.pending_user {
            return SessionAuth::AwaitingSecondFactor {
                username: pending.clone(),
            };
        }
        SessionAuth::Anonymous
    }

    /// Mark factor 1 as passed; the session now awaits a TOTP code.
    ///
    /// Returns `false` if the session no longer exists.
    pub async fn set_awaiting_second_factor(&self, session_id: &str, username: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get_mut(session_id) else {
            return false;
        };
        entry.user = None;
        entry.pending_user = Some(username.to_string());
        true
    }

    /// Transition the session to fully authenticated, clearing any
    /// pending-second-factor marker.
    pub async fn set_authenticated(&self, session_id: &str, username: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get_mut(session_id) else {
            return false;
        };
        entry.pending_user = None;
        entry.user = Some(username.to_string());
        true
    }

    /// Lazily generate the per-session CSRF token; idempotent thereafter.
    ///
    /// Returns `Ok(None)` if the session no longer exists.
    ///
    /// # Errors
    /// Returns an error if the system random source fails.
    pub async fn csrf_token(&self, session_id: &str) -> Result<Option<String>> {
        let mut sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get_mut(session_id) else {
            return Ok(None);
        };
        if entry.csrf_token.is_none() {
            entry.csrf_token = Some(random_token(CSRF_TOKEN_BYTES)?);
        }
        Ok(entry.csrf_token.clone())
    }

    /// Constant-time CSRF comparison; fails closed when either side is
    /// absent.
    pub async fn verify_csrf(&self, session_id: &str, presented: &str) -> bool {
        if presented.is_empty() {
            return false;
        }
        let sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get(session_id) else {
            return false;
        };
        let Some(expected) = &entry.csrf_token else {
            return false;
        };
        expected
            .as_bytes()
            .ct_eq(presented.as_bytes())
            .into()
    }

    /// Signed cookie value for a session identifier.
    #[must_use]
    pub fn cookie_value(&self, session_id: &str) -> String {
        format!("{session_id}.{}", self.sign(session_id))
    }

    /// Full `Set-Cookie` value: `HttpOnly`, `SameSite=Strict`, bounded
    /// max-age, plus `Secure` when the panel is served over HTTPS.
    #[must_use]
    pub fn cookie_header(&self, session_id: &str) -> String {
        let value = self.cookie_value(session_id);
        let max_age = self.idle_ttl.as_secs();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that clears the session cookie.
    #[must_use]
    pub fn clear_cookie_header(&self) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn sign(&self, session_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(session_id.as_bytes());
        Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes())
    }

    fn verify_signature(&self, session_id: &str, signature: &str) -> bool {
        let Ok(signature_bytes) = Base64UrlUnpadded::decode_vec(signature) else {
            return false;
        };
        let Ok(mut mac) =
            HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
        else {
            return false;
        };
        mac.update(session_id.as_bytes());
        // verify_slice is constant-time.
        mac.verify_slice(&signature_bytes).is_ok()
    }
}

fn random_token(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to read from system random source")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}
