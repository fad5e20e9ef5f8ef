//! Server action: wire the credential store, sessions, TOTP engine, and
//! gateway collaborators, then serve the panel.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::warn;

use crate::api::{self, PanelState};
use crate::auth::{AuthFlow, CredentialStore, FileCredentialStore, SessionStore, TotpEngine};
use crate::gateway::{GatewayInvoker, GatewayTool, RoutingConfigLoader};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub auth_file: String,
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub cookie_secret: Option<String>,
    pub totp_issuer: String,
    pub routing_config: String,
    pub tool_path: String,
    pub tool_timeout_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the credential store is unreadable or the server
/// fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let signing_key = match args.cookie_secret {
        Some(secret) => SecretString::from(secret),
        None => {
            warn!("no cookie signing key configured; sessions will not survive a restart");
            SecretString::from(random_signing_key()?)
        }
    };

    let sessions = Arc::new(SessionStore::new(
        signing_key,
        Duration::from_secs(args.session_ttl_seconds),
        args.cookie_secure,
    ));

    let credentials = FileCredentialStore::new(&args.auth_file);
    // Eager load so first-run provisioning lands in the startup log.
    credentials
        .load()
        .with_context(|| format!("failed to load credential store: {}", args.auth_file))?;

    let auth = AuthFlow::new(
        Box::new(credentials),
        Arc::clone(&sessions),
        TotpEngine::new(args.totp_issuer),
    );

    let gateway: Arc<dyn GatewayInvoker> = Arc::new(GatewayTool::new(
        &args.tool_path,
        Duration::from_secs(args.tool_timeout_seconds),
    ));

    let state = Arc::new(PanelState {
        auth,
        sessions,
        routing: RoutingConfigLoader::new(&args.routing_config),
        gateway,
    });

    api::serve(args.port, state).await
}

fn random_signing_key() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to read from system random source")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}
