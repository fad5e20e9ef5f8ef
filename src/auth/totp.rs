//! TOTP secret generation and time-windowed code verification.

use anyhow::{anyhow, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const STEP_SECONDS: u64 = 30;
// One step of tolerance either side absorbs authenticator clock drift.
const SKEW_STEPS: u8 = 1;

/// Generates enrollment secrets and verifies six-digit codes.
#[derive(Debug, Clone)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generate a fresh random secret, base32-encoded.
    ///
    /// # Errors
    /// Returns an error if secret generation fails.
    pub fn generate_secret(&self) -> Result<String> {
        let secret = Secret::generate_secret();
        let bytes = secret
            .to_bytes()
            .map_err(|e| anyhow!("secret generation error: {e:?}"))?;
        let totp = self.instance(bytes, DEFAULT_ACCOUNT)?;
        Ok(totp.get_secret_base32())
    }

    /// Build the `otpauth://` provisioning URI for an authenticator app.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32 or too short.
    pub fn provisioning_uri(&self, secret: &str, account: &str) -> Result<String> {
        let bytes = decode_secret(secret)?;
        let totp = self.instance(bytes, account)?;
        Ok(totp.get_url())
    }

    /// Verify a code against the current clock.
    #[must_use]
    pub fn verify(&self, secret: &str, code: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.verify_at(secret, code, now)
    }

    /// Verify a code at an explicit unix timestamp.
    ///
    /// Accepts the current 30-second step plus one step either side.
    /// Malformed secrets or codes verify as `false` rather than erroring.
    #[must_use]
    pub fn verify_at(&self, secret: &str, code: &str, unix_time: u64) -> bool {
        let Ok(bytes) = decode_secret(secret) else {
            return false;
        };
        let Ok(totp) = self.instance(bytes, DEFAULT_ACCOUNT) else {
            return false;
        };
        totp.check(code, unix_time)
    }

    fn instance(&self, secret_bytes: Vec<u8>, account: &str) -> Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW_STEPS,
            STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| anyhow!("totp init error: {e}"))
    }
}

// Account label only matters for the provisioning URI, not verification.
const DEFAULT_ACCOUNT: &str = "admin";

fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|e| anyhow!("invalid base32 secret: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_at(engine: &TotpEngine, secret: &str, unix_time: u64) -> String {
        let bytes = decode_secret(secret).unwrap();
        let totp = engine.instance(bytes, DEFAULT_ACCOUNT).unwrap();
        totp.generate(unix_time)
    }

    #[test]
    fn generated_secret_is_base32() {
        let engine = TotpEngine::new("Flowgate");
        let secret = engine.generate_secret().unwrap();
        assert!(!secret.is_empty());
        assert!(secret
            .chars()
            .all(|c| "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".contains(c)));
    }

    #[test]
    fn provisioning_uri_carries_issuer_and_secret() {
        let engine = TotpEngine::new("Flowgate");
        let secret = engine.generate_secret().unwrap();
        let uri = engine.provisioning_uri(&secret, "admin").unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains(&format!("secret={secret}")));
        assert!(uri.contains("issuer=Flowgate"));
    }

    #[test]
    fn verify_accepts_current_and_adjacent_steps() {
        let engine = TotpEngine::new("Flowgate");
        let secret = engine.generate_secret().unwrap();
        let at = 1_700_000_015;

        let code = code_at(&engine, &secret, at);
        assert!(engine.verify_at(&secret, &code, at));
        // One step of drift either side still verifies.
        assert!(engine.verify_at(&secret, &code, at + STEP_SECONDS));
        assert!(engine.verify_at(&secret, &code, at - STEP_SECONDS));
        // Two steps away does not.
        assert!(!engine.verify_at(&secret, &code, at + 3 * STEP_SECONDS));
    }

    #[test]
    fn verify_rejects_wrong_or_malformed_codes() {
        let engine = TotpEngine::new("Flowgate");
        let secret = engine.generate_secret().unwrap();
        let at = 1_700_000_015;

        assert!(!engine.verify_at(&secret, "000000", at)
            || code_at(&engine, &secret, at) == "000000");
        assert!(!engine.verify_at(&secret, "not-a-code", at));
        assert!(!engine.verify_at(&secret, "", at));
        assert!(!engine.verify_at("%%%not-base32%%%", "123456", at));
    }
}
