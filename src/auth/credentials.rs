//! Persistent storage for the single administrative identity.
//!
//! The credential record is a small JSON file at an operator-controlled
//! path, written atomically with owner-only permissions. On first access
//! the store provisions a random password and logs it exactly once; the
//! plaintext is never recoverable afterwards.

use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::error;

use super::error::StorageError;
use super::password;

/// Alphabet for generated passwords, excluding visually confusable
/// characters (0/O, 1/l/I).
const PASSWORD_ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GENERATED_PASSWORD_LENGTH: usize = 16;

pub const DEFAULT_USERNAME: &str = "admin";

/// The single administrative identity.
///
/// Only `totp_secret` gates logins; `totp_secret_pending` holds an
/// enrollment that has not yet been confirmed with a valid code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub totp_secret: Option<String>,
    #[serde(default)]
    pub totp_secret_pending: Option<String>,
    #[serde(default)]
    pub password_change_required: bool,
}

impl Credential {
    #[must_use]
    pub fn has_second_factor(&self) -> bool {
        self.totp_secret.is_some()
    }
}

/// Storage seam for the credential record so tests can substitute an
/// in-memory store for the file-backed one.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted credential, provisioning one if absent.
    fn load(&self) -> Result<Credential, StorageError>;

    /// Overwrite the persisted credential. Must never leave a partially
    /// written record observable to concurrent readers.
    fn save(&self, credential: &Credential) -> Result<(), StorageError>;
}

/// Generate a random initial password from the unambiguous alphabet.
fn generate_password() -> String {
    let mut rng = OsRng;
    (0..GENERATED_PASSWORD_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_ALPHABET.len());
            PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Build a fresh admin credential with a generated password.
///
/// Returns the record and the plaintext; the caller decides where the
/// plaintext surfaces (the file store logs it, tests assert against it).
pub(crate) fn provision_credential() -> Result<(Credential, String), StorageError> {
    let plaintext = generate_password();
    let password_hash =
        password::hash_password(&plaintext).map_err(|e| StorageError::Crypto(e.to_string()))?;
    let credential = Credential {
        username: DEFAULT_USERNAME.to_string(),
        password_hash,
        totp_secret: None,
        totp_secret_pending: None,
        password_change_required: true,
    };
    Ok((credential, plaintext))
}

fn log_generated_password(username: &str, plaintext: &str) {
    // The only moment the plaintext exists outside memory. Emitted at
    // ERROR so it clears the default log filter with no -v flags; an
    // operator who never sees this password cannot log in at all.
    error!("============================================================");
    error!("initial credentials generated:");
    error!("  username: {username}");
    error!("  password: {plaintext}");
    error!("  CHANGE THIS PASSWORD IMMEDIATELY");
    error!("============================================================");
}

/// File-backed credential store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn provision(&self) -> Result<Credential, StorageError> {
        let (credential, plaintext) = provision_credential()?;
        self.save(&credential)?;
        log_generated_password(&credential.username, &plaintext);
        Ok(credential)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Credential, StorageError> {
        if !self.path.exists() {
            return self.provision();
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Write to a temporary file in the same directory and rename it
        // into place, so concurrent readers only ever observe a complete
        // record.
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut tmp, credential)?;
        tmp.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

/// In-memory credential store backing unit and integration tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seeded(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Credential, StorageError> {
        let mut slot = self
            .credential
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(credential) = slot.as_ref() {
            return Ok(credential.clone());
        }
        let (credential, plaintext) = provision_credential()?;
        log_generated_password(&credential.username, &plaintext);
        *slot = Some(credential.clone());
        Ok(credential)
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let mut slot = self
            .credential
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(credential.clone());
        Ok(())
    }
}
