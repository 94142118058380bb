//! Agent response types

use super::task::AgentOutput;
use super::AgentKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Malformed agent output: {0}")]
    Malformed(String),

    #[error("Expected output from {expected}, got output from {got}")]
    UnexpectedOutput { expected: AgentKind, got: AgentKind },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Response from the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The typed output
    pub output: AgentOutput,

    /// Token usage information
    #[serde(default)]
    pub usage: TokenUsage,
}

impl AgentResponse {
    /// Create a response with no usage recorded
    pub fn new(output: AgentOutput) -> Self {
        Self {
            output,
            usage: TokenUsage::default(),
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = TokenUsage {
            prompt_tokens,
            completion_tokens,
        };
        self
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}
