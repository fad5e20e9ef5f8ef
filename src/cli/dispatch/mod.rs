//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the appropriate action, such as
//! starting the panel server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, gateway};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8088);

    let auth_opts = auth::Options::parse(matches)?;
    let gateway_opts = gateway::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        auth_file: auth_opts.auth_file,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        cookie_secure: auth_opts.cookie_secure,
        cookie_secret: auth_opts.cookie_secret,
        totp_issuer: auth_opts.totp_issuer,
        routing_config: gateway_opts.routing_config,
        tool_path: gateway_opts.tool_path,
        tool_timeout_seconds: gateway_opts.tool_timeout_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_server_action() {
        temp_env::with_vars(
            [
                ("FLOWGATE_WEB_PORT", None::<&str>),
                ("FLOWGATE_WEB_AUTH_FILE", None),
                ("FLOWGATE_WEB_SECRET", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["flowgate-web"]);
                let Action::Server(args) = handler(&matches).unwrap();
                assert_eq!(args.port, 8088);
                assert_eq!(args.auth_file, "/var/lib/flowgate/auth.json");
                assert_eq!(args.routing_config, "/etc/flowgate/flowgate.yaml");
                assert_eq!(args.tool_path, "/usr/bin/flowgate");
                assert_eq!(args.tool_timeout_seconds, 60);
                assert_eq!(args.session_ttl_seconds, 3600);
                assert!(!args.cookie_secure);
                assert!(args.cookie_secret.is_none());
                assert_eq!(args.totp_issuer, "Flowgate");
            },
        );
    }

    #[test]
    fn flags_override_defaults() {
        let command = crate::cli::commands::new();
        let matches = command.get_matches_from(vec![
            "flowgate-web",
            "--port",
            "9100",
            "--auth-file",
            "/tmp/auth.json",
            "--cookie-secure",
            "--cookie-secret",
            "fixed-key",
            "--tool-timeout",
            "5",
        ]);
        let Action::Server(args) = handler(&matches).unwrap();
        assert_eq!(args.port, 9100);
        assert_eq!(args.auth_file, "/tmp/auth.json");
        assert!(args.cookie_secure);
        assert_eq!(args.cookie_secret.as_deref(), Some("fixed-key"));
        assert_eq!(args.tool_timeout_seconds, 5);
    }
}
