//! Invocation of the external gateway binary with validated arguments.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one tool run: whether it exited zero, plus its combined
/// stdout and stderr.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub succeeded: bool,
    pub output: String,
}

/// Seam over the external binary so request handlers can be tested
/// without a gateway installation.
#[async_trait]
pub trait GatewayInvoker: Send + Sync {
    /// Run the tool with the given arguments. Never retries; a non-zero
    /// exit, a timeout, or a spawn failure all report as `succeeded:
    /// false` with a human-readable message.
    async fn invoke(&self, args: &[&str]) -> ToolOutcome;
}

/// Runs the real gateway binary as a subprocess, bounded by a timeout.
pub struct GatewayTool {
    binary: PathBuf,
    timeout: Duration,
}

impl GatewayTool {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl GatewayInvoker for GatewayTool {
    async fn invoke(&self, args: &[&str]) -> ToolOutcome {
        debug!("running {} {}", self.binary.display(), args.join(" "));
        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                let succeeded = output.status.success();
                if !succeeded {
                    warn!("gateway tool exited with {}", output.status);
                }
                ToolOutcome {
                    succeeded,
                    output: combined,
                }
            }
            Ok(Err(e)) => {
                warn!("gateway tool failed to start: {e}");
                ToolOutcome {
                    succeeded: false,
                    output: e.to_string(),
                }
            }
            Err(_) => {
                warn!("gateway tool timed out after {:?}", self.timeout);
                ToolOutcome {
                    succeeded: false,
                    output: "command timed out".to_string(),
                }
            }
        }
    }
}
