//! Authentication-related CLI arguments.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};

use crate::auth::DEFAULT_SESSION_TTL_SECONDS;

pub const ARG_AUTH_FILE: &str = "auth-file";
pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_COOKIE_SECRET: &str = "cookie-secret";
pub const ARG_TOTP_ISSUER: &str = "totp-issuer";

#[derive(Debug)]
pub struct Options {
    pub auth_file: String,
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub cookie_secret: Option<String>,
    pub totp_issuer: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            auth_file: matches
                .get_one::<String>(ARG_AUTH_FILE)
                .cloned()
                .context("missing required argument: --auth-file")?,
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL)
                .copied()
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            cookie_secret: matches.get_one::<String>(ARG_COOKIE_SECRET).cloned(),
            totp_issuer: matches
                .get_one::<String>(ARG_TOTP_ISSUER)
                .cloned()
                .context("missing required argument: --totp-issuer")?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_FILE)
                .long(ARG_AUTH_FILE)
                .help("Path of the credential record")
                .default_value("/var/lib/flowgate/auth.json")
                .env("FLOWGATE_WEB_AUTH_FILE"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session idle lifetime in seconds")
                .default_value("3600")
                .env("FLOWGATE_WEB_SESSION_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS-only deployments)")
                .env("FLOWGATE_WEB_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECRET)
                .long(ARG_COOKIE_SECRET)
                .help("Session cookie signing key; a random one is generated when unset")
                .env("FLOWGATE_WEB_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOTP_ISSUER)
                .long(ARG_TOTP_ISSUER)
                .help("Issuer label shown in authenticator apps")
                .default_value("Flowgate")
                .env("FLOWGATE_WEB_TOTP_ISSUER"),
        )
}
