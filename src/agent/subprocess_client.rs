//! Subprocess agent - runs an external generator per request
//!
//! The generator receives the [`AgentRequest`] as JSON on stdin and must print
//! an [`AgentResponse`] as JSON on stdout.

use crate::agent::{AgentClientConfig, AgentError, AgentExecutor, AgentRequest, AgentResponse};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

const DEFAULT_COMMAND: &str = "coursegen-agent";

/// Agent backed by an external executable
#[derive(Debug, Clone)]
pub struct CommandAgent {
    /// Path to the generator executable
    command: String,

    args: Vec<String>,

    /// Timeout for command execution in seconds
    timeout_secs: u64,
}

impl CommandAgent {
    /// Create a new command agent
    ///
    /// The `config.command` field is used as the path to the generator.
    /// If not provided, defaults to "coursegen-agent" (assuming it's on PATH).
    pub fn new(config: AgentClientConfig) -> Self {
        Self {
            command: config.command.unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
            args: config.args,
            timeout_secs: config.timeout_secs,
        }
    }

    /// Get the generator executable path
    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, AgentError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgentError::Internal(format!("Failed to spawn {}: {}", self.command, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A generator may exit without reading its input; its exit status tells the story.
            if let Err(e) = stdin.write_all(&input).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(AgentError::Internal(format!(
                        "Failed to write request to {}: {}",
                        self.command, e
                    )));
                }
            }
        }

        let output = child.wait_with_output().await.map_err(|e| {
            AgentError::Internal(format!("Failed to wait for {}: {}", self.command, e))
        })?;

        // Check exit code
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.command, exit_code, stderr.trim());
            return Err(AgentError::Api(format!(
                "{} exited with code {}: {}",
                self.command,
                exit_code,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl AgentExecutor for CommandAgent {
    async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        let input = serde_json::to_vec(request)
            .map_err(|e| AgentError::Internal(format!("Failed to encode request: {}", e)))?;
        debug!(
            "Spawning {} for {} ({} byte request)",
            self.command,
            request.agent,
            input.len()
        );

        let stdout = timeout(Duration::from_secs(self.timeout_secs), self.run(input))
            .await
            .map_err(|_| AgentError::Timeout(self.timeout_secs))??;

        debug!("{} returned {} bytes of output", self.command, stdout.len());

        serde_json::from_slice(&stdout).map_err(|e| AgentError::Malformed(e.to_string()))
    }
}
