//! Gateway collaborator CLI arguments: routing config path and tool
//! invocation settings.

use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_ROUTING_CONFIG: &str = "routing-config";
pub const ARG_TOOL_PATH: &str = "tool-path";
pub const ARG_TOOL_TIMEOUT: &str = "tool-timeout";

#[derive(Debug)]
pub struct Options {
    pub routing_config: String,
    pub tool_path: String,
    pub tool_timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            routing_config: matches
                .get_one::<String>(ARG_ROUTING_CONFIG)
                .cloned()
                .context("missing required argument: --routing-config")?,
            tool_path: matches
                .get_one::<String>(ARG_TOOL_PATH)
                .cloned()
                .context("missing required argument: --tool-path")?,
            tool_timeout_seconds: matches
                .get_one::<u64>(ARG_TOOL_TIMEOUT)
                .copied()
                .unwrap_or(60),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ROUTING_CONFIG)
                .long(ARG_ROUTING_CONFIG)
                .help("Path of the gateway routing configuration (read-only)")
                .default_value("/etc/flowgate/flowgate.yaml")
                .env("FLOWGATE_WEB_ROUTING_CONFIG"),
        )
        .arg(
            Arg::new(ARG_TOOL_PATH)
                .long(ARG_TOOL_PATH)
                .help("Path of the gateway binary")
                .default_value("/usr/bin/flowgate")
                .env("FLOWGATE_WEB_TOOL_PATH"),
        )
        .arg(
            Arg::new(ARG_TOOL_TIMEOUT)
                .long(ARG_TOOL_TIMEOUT)
                .help("Gateway tool timeout in seconds")
                .default_value("60")
                .env("FLOWGATE_WEB_TOOL_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
}
