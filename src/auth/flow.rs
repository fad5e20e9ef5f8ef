//! Two-step login state machine and credential mutation flows.
//!
//! A session moves `Anonymous -> AwaitingSecondFactor -> Authenticated`
//! (skipping the middle state when no TOTP secret is enrolled). Every
//! transition is guarded: failures leave the session in its current state
//! and never advance authentication on ambiguous input.
//!
//! The credential record is a single shared resource; every
//! read-modify-write cycle here runs under one mutex so a 2FA enrollment
//! confirmation can never race a concurrent settings update.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::credentials::{Credential, CredentialStore};
use super::error::{AuthError, StorageError};
use super::password;
use super::session::{SessionAuth, SessionStore};
use super::totp::TotpEngine;

/// Result of a successful login transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStep {
    /// Factor 1 passed; a TOTP code is now required.
    SecondFactorRequired,
    /// Fully authenticated. When `must_change_password` is set the
    /// request layer redirects to the forced settings-update flow before
    /// any other authenticated action proceeds.
    LoggedIn { must_change_password: bool },
}

/// Secret and provisioning URI handed to the operator at enrollment start.
#[derive(Debug, Clone)]
pub struct EnrollmentStart {
    pub secret: String,
    pub uri: String,
}

pub struct AuthFlow {
    credentials: Mutex<Box<dyn CredentialStore>>,
    sessions: Arc<SessionStore>,
    totp: TotpEngine,
}

impl AuthFlow {
    #[must_use]
    pub fn new(
        credentials: Box<dyn CredentialStore>,
        sessions: Arc<SessionStore>,
        totp: TotpEngine,
    ) -> Self {
        Self {
            credentials: Mutex::new(credentials),
            sessions,
            totp,
        }
    }

    /// Factor 1: username and password.
    ///
    /// # Errors
    /// `InvalidCredentials` on any mismatch, reported generically so the
    /// response never reveals whether the username or the password failed.
    pub async fn submit_credentials(
        &self,
        session_id: &str,
        username: &str,
        password: &str,
    ) -> Result<LoginStep, AuthError> {
        let credential = self.credentials.lock().await.load()?;

        // The hash check runs regardless of the username outcome to keep
        // mismatch timing uniform.
        let username_ok = username == credential.username;
        let password_ok = password::verify_password(password, &credential.password_hash);
        if !(username_ok && password_ok) {
            return Err(AuthError::InvalidCredentials);
        }

        if credential.has_second_factor() {
            if !self
                .sessions
                .set_awaiting_second_factor(session_id, &credential.username)
                .await
            {
                return Err(AuthError::NotAuthenticated);
            }
            return Ok(LoginStep::SecondFactorRequired);
        }

        if !self
            .sessions
            .set_authenticated(session_id, &credential.username)
            .await
        {
            return Err(AuthError::NotAuthenticated);
        }
        info!("login: {}", credential.username);
        Ok(LoginStep::LoggedIn {
            must_change_password: credential.password_change_required,
        })
    }

    /// Factor 2: TOTP code, only valid from `AwaitingSecondFactor`.
    ///
    /// # Errors
    /// `InvalidSecondFactor` on a wrong code; the session stays in
    /// `AwaitingSecondFactor` across any number of attempts.
    pub async fn submit_second_factor(
        &self,
        session_id: &str,
        code: &str,
    ) -> Result<LoginStep, AuthError> {
        let SessionAuth::AwaitingSecondFactor { username } =
            self.sessions.auth_state(session_id).await
        else {
            return Err(AuthError::NotAuthenticated);
        };

        let credential = self.credentials.lock().await.load()?;
        let Some(secret) = credential.totp_secret.as_deref() else {
            // Secret removed between factors; restart the login.
            return Err(AuthError::NotAuthenticated);
        };
        if !self.totp.verify(secret, code) {
            return Err(AuthError::InvalidSecondFactor);
        }

        if !self.sessions.set_authenticated(session_id, &username).await {
            return Err(AuthError::NotAuthenticated);
        }
        info!("login: {username}");
        Ok(LoginStep::LoggedIn {
            must_change_password: credential.password_change_required,
        })
    }

    /// Destroy the session entirely. A replayed cookie afterwards behaves
    /// like an anonymous request.
    pub async fn logout(&self, session_id: &str) {
        self.sessions.destroy(session_id).await;
    }

    /// Username of a fully authenticated session, if any.
    pub async fn authenticated_user(&self, session_id: &str) -> Option<String> {
        match self.sessions.auth_state(session_id).await {
            SessionAuth::Authenticated { username } => Some(username),
            _ => None,
        }
    }

    /// Whether the forced password-change gate is still active.
    ///
    /// # Errors
    /// Propagates credential storage failures.
    pub async fn password_change_required(&self) -> Result<bool, AuthError> {
        let credential = self.credentials.lock().await.load()?;
        Ok(credential.password_change_required)
    }

    /// Update username and (optionally) password. Requires a fully
    /// authenticated session and a valid CSRF token. TOTP state is left
    /// untouched; the forced-password-change flag is cleared.
    ///
    /// # Errors
    /// `NotAuthenticated`, `CsrfMismatch`, or storage failures.
    pub async fn update_credentials(
        &self,
        session_id: &str,
        csrf_token: &str,
        new_username: &str,
        new_password: Option<&str>,
    ) -> Result<(), AuthError> {
        let Some(user) = self.authenticated_user(session_id).await else {
            return Err(AuthError::NotAuthenticated);
        };
        if !self.sessions.verify_csrf(session_id, csrf_token).await {
            return Err(AuthError::CsrfMismatch);
        }

        let store = self.credentials.lock().await;
        let mut credential = store.load()?;
        credential.username = new_username.to_string();
        if let Some(password) = new_password.filter(|p| !p.is_empty()) {
            credential.password_hash = password::hash_password(password)
                .map_err(|e| StorageError::Crypto(e.to_string()))?;
        }
        credential.password_change_required = false;
        store.save(&credential)?;
        drop(store);

        // Keep the session's identity in sync with the rename.
        self.sessions
            .set_authenticated(session_id, &credential.username)
            .await;
        info!("credentials updated by {user}");
        Ok(())
    }

    /// Start 2FA enrollment: generate a secret, persist it as pending,
    /// and return it with its provisioning URI. The pending secret does
    /// not gate logins until confirmed.
    ///
    /// # Errors
    /// `NotAuthenticated` or storage failures.
    pub async fn begin_enrollment(&self, session_id: &str) -> Result<EnrollmentStart, AuthError> {
        if self.authenticated_user(session_id).await.is_none() {
            return Err(AuthError::NotAuthenticated);
        }

        let store = self.credentials.lock().await;
        let mut credential = store.load()?;
        let secret = self
            .totp
            .generate_secret()
            .map_err(|e| StorageError::Crypto(e.to_string()))?;
        credential.totp_secret_pending = Some(secret.clone());
        store.save(&credential)?;

        let uri = self
            .totp
            .provisioning_uri(&secret, &credential.username)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;
        Ok(EnrollmentStart { secret, uri })
    }

    /// Confirm enrollment with a code from the authenticator. On success
    /// the pending secret becomes the active one; on failure it is left
    /// intact for retry.
    ///
    /// # Errors
    /// `NoPendingEnrollment` if nothing is pending, `InvalidSecondFactor`
    /// on a wrong code.
    pub async fn confirm_enrollment(&self, session_id: &str, code: &str) -> Result<(), AuthError> {
        if self.authenticated_user(session_id).await.is_none() {
            return Err(AuthError::NotAuthenticated);
        }

        let store = self.credentials.lock().await;
        let mut credential = store.load()?;
        let Some(pending) = credential.totp_secret_pending.clone() else {
            return Err(AuthError::NoPendingEnrollment);
        };
        if !self.totp.verify(&pending, code) {
            return Err(AuthError::InvalidSecondFactor);
        }

        credential.totp_secret = Some(pending);
        credential.totp_secret_pending = None;
        store.save(&credential)?;
        info!("2fa enabled for {}", credential.username);
        Ok(())
    }

    /// Disable 2FA. Requires a valid CSRF token, re-verification of the
    /// current password, and (when a secret is enrolled) a valid current
    /// code, so a hijacked session alone cannot strip the second factor.
    ///
    /// # Errors
    /// `CsrfMismatch`, `InvalidCredentials` on a wrong password, or
    /// `InvalidSecondFactor` on a missing/wrong code.
    pub async fn disable_second_factor(
        &self,
        session_id: &str,
        csrf_token: &str,
        password: &str,
        code: Option<&str>,
    ) -> Result<(), AuthError> {
        if self.authenticated_user(session_id).await.is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        if !self.sessions.verify_csrf(session_id, csrf_token).await {
            return Err(AuthError::CsrfMismatch);
        }

        let store = self.credentials.lock().await;
        let mut credential = store.load()?;
        if !password::verify_password(password, &credential.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if let Some(secret) = credential.totp_secret.as_deref() {
            let presented = code.unwrap_or_default();
            if !self.totp.verify(secret, presented) {
                return Err(AuthError::InvalidSecondFactor);
            }
        }

        credential.totp_secret = None;
        store.save(&credential)?;
        info!("2fa disabled for {}", credential.username);
        Ok(())
    }

    /// Current credential record, for read-only views.
    ///
    /// # Errors
    /// Propagates credential storage failures.
    pub async fn credential(&self) -> Result<Credential, AuthError> {
        Ok(self.credentials.lock().await.load()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::MemoryCredentialStore;
    use secrecy::SecretString;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    const PASSWORD: &str = "initial-password";

    fn seeded_credential(totp_secret: Option<String>) -> Credential {
        Credential {
            username: "admin".to_string(),
            password_hash: password::hash_password(PASSWORD).unwrap(),
            totp_secret,
            totp_secret_pending: None,
            password_change_required: false,
        }
    }

    fn flow_with(credential: Credential) -> (AuthFlow, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new(
            SecretString::from("test signing key".to_string()),
            Duration::from_secs(3600),
            false,
        ));
        let flow = AuthFlow::new(
            Box::new(MemoryCredentialStore::seeded(credential)),
            Arc::clone(&sessions),
            TotpEngine::new("Flowgate"),
        );
        (flow, sessions)
    }

    fn current_code(secret: &str) -> String {
        let engine = TotpEngine::new("Flowgate");
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        // Walk codes until one verifies at the current clock; the engine's
        // own generator is private, so derive via totp_rs directly.
        let bytes = totp_rs::Secret::Encoded(secret.to_string())
            .to_bytes()
            .unwrap();
        let totp = totp_rs::TOTP::new(
            totp_rs::Algorithm::SHA1,
            6,
            1,
            30,
            bytes,
            Some("Flowgate".to_string()),
            "admin".to_string(),
        )
        .unwrap();
        let code = totp.generate(now);
        assert!(engine.verify(secret, &code));
        code
    }

    #[tokio::test]
    async fn password_only_login_authenticates_directly() {
        let (flow, sessions) = flow_with(seeded_credential(None));
        let session_id = sessions.create().await.unwrap();

        let step = flow
            .submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();
        assert_eq!(
            step,
            LoginStep::LoggedIn {
                must_change_password: false
            }
        );
        assert_eq!(
            flow.authenticated_user(&session_id).await.as_deref(),
            Some("admin")
        );
    }

    #[tokio::test]
    async fn wrong_username_or_password_is_one_generic_error() {
        let (flow, sessions) = flow_with(seeded_credential(None));
        let session_id = sessions.create().await.unwrap();

        for (user, pass) in [("admin", "wrong"), ("nobody", PASSWORD), ("nobody", "wrong")] {
            let err = flow
                .submit_credentials(&session_id, user, pass)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        assert!(flow.authenticated_user(&session_id).await.is_none());
    }

    #[tokio::test]
    async fn enrolled_secret_forces_second_factor() {
        let engine = TotpEngine::new("Flowgate");
        let secret = engine.generate_secret().unwrap();
        let (flow, sessions) = flow_with(seeded_credential(Some(secret.clone())));
        let session_id = sessions.create().await.unwrap();

        let step = flow
            .submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();
        assert_eq!(step, LoginStep::SecondFactorRequired);
        // Not yet authenticated.
        assert!(flow.authenticated_user(&session_id).await.is_none());

        // Wrong code keeps the session awaiting, ready for retry.
        let err = flow
            .submit_second_factor(&session_id, "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSecondFactor));

        let code = current_code(&secret);
        let step = flow
            .submit_second_factor(&session_id, &code)
            .await
            .unwrap();
        assert!(matches!(step, LoginStep::LoggedIn { .. }));
        assert_eq!(
            flow.authenticated_user(&session_id).await.as_deref(),
            Some("admin")
        );
    }

    #[tokio::test]
    async fn second_factor_without_first_is_rejected() {
        let (flow, sessions) = flow_with(seeded_credential(None));
        let session_id = sessions.create().await.unwrap();
        let err = flow
            .submit_second_factor(&session_id, "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn logout_then_replay_is_anonymous() {
        let (flow, sessions) = flow_with(seeded_credential(None));
        let session_id = sessions.create().await.unwrap();
        flow.submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();

        flow.logout(&session_id).await;
        assert!(flow.authenticated_user(&session_id).await.is_none());
        let err = flow
            .update_credentials(&session_id, "token", "admin", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn update_credentials_requires_csrf_and_clears_forced_change() {
        let mut credential = seeded_credential(None);
        credential.password_change_required = true;
        let (flow, sessions) = flow_with(credential);
        let session_id = sessions.create().await.unwrap();
        flow.submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();

        let err = flow
            .update_credentials(&session_id, "bogus", "operator", Some("new-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CsrfMismatch));

        let csrf = sessions.csrf_token(&session_id).await.unwrap().unwrap();
        flow.update_credentials(&session_id, &csrf, "operator", Some("new-password"))
            .await
            .unwrap();

        let credential = flow.credential().await.unwrap();
        assert_eq!(credential.username, "operator");
        assert!(!credential.password_change_required);
        assert!(password::verify_password(
            "new-password",
            &credential.password_hash
        ));
        // Session identity follows the rename.
        assert_eq!(
            flow.authenticated_user(&session_id).await.as_deref(),
            Some("operator")
        );
    }

    #[tokio::test]
    async fn empty_password_keeps_old_hash() {
        let (flow, sessions) = flow_with(seeded_credential(None));
        let session_id = sessions.create().await.unwrap();
        flow.submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();
        let csrf = sessions.csrf_token(&session_id).await.unwrap().unwrap();

        flow.update_credentials(&session_id, &csrf, "admin", Some(""))
            .await
            .unwrap();
        let credential = flow.credential().await.unwrap();
        assert!(password::verify_password(PASSWORD, &credential.password_hash));
    }

    #[tokio::test]
    async fn enrollment_promotes_pending_only_on_valid_code() {
        let (flow, sessions) = flow_with(seeded_credential(None));
        let session_id = sessions.create().await.unwrap();
        flow.submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();

        let start = flow.begin_enrollment(&session_id).await.unwrap();
        assert!(start.uri.starts_with("otpauth://totp/"));
        // Pending secret does not yet gate logins.
        let credential = flow.credential().await.unwrap();
        assert!(!credential.has_second_factor());
        assert_eq!(credential.totp_secret_pending.as_deref(), Some(&*start.secret));

        let err = flow
            .confirm_enrollment(&session_id, "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSecondFactor));
        // Pending survives the failed attempt.
        assert!(flow
            .credential()
            .await
            .unwrap()
            .totp_secret_pending
            .is_some());

        let code = current_code(&start.secret);
        flow.confirm_enrollment(&session_id, &code).await.unwrap();
        let credential = flow.credential().await.unwrap();
        assert_eq!(credential.totp_secret.as_deref(), Some(&*start.secret));
        assert!(credential.totp_secret_pending.is_none());
    }

    #[tokio::test]
    async fn confirm_without_pending_enrollment_errors() {
        let (flow, sessions) = flow_with(seeded_credential(None));
        let session_id = sessions.create().await.unwrap();
        flow.submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();
        let err = flow
            .confirm_enrollment(&session_id, "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoPendingEnrollment));
    }

    #[tokio::test]
    async fn disable_requires_password_and_current_code() {
        let engine = TotpEngine::new("Flowgate");
        let secret = engine.generate_secret().unwrap();
        let (flow, sessions) = flow_with(seeded_credential(Some(secret.clone())));
        let session_id = sessions.create().await.unwrap();
        flow.submit_credentials(&session_id, "admin", PASSWORD)
            .await
            .unwrap();
        let code = current_code(&secret);
        flow.submit_second_factor(&session_id, &code).await.unwrap();
        let csrf = sessions.csrf_token(&session_id).await.unwrap().unwrap();

        let err = flow
            .disable_second_factor(&session_id, &csrf, "wrong-password", Some(&code))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = flow
            .disable_second_factor(&session_id, &csrf, PASSWORD, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSecondFactor));

        let code = current_code(&secret);
        flow.disable_second_factor(&session_id, &csrf, PASSWORD, Some(&code))
            .await
            .unwrap();
        assert!(!flow.credential().await.unwrap().has_second_factor());
    }
}
