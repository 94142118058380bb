//! Agent client configuration

/// Configuration for the command-backed agent
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    /// Path to the generator executable.
    ///
    /// If not provided, defaults to "coursegen-agent" (assumes it's on PATH).
    pub command: Option<String>,

    /// Extra arguments passed before any request data
    pub args: Vec<String>,

    /// Timeout for one invocation in seconds
    pub timeout_secs: u64,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: 600,
        }
    }
}

impl AgentClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
