//! Pipeline configuration from YAML

use crate::agent::{AgentKind, ModelTier};
use crate::core::step::{GatePolicy, PipelineStep};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Per-agent overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Model tier to request instead of the agent's default
    #[serde(default)]
    pub tier: Option<ModelTier>,

    /// Timeout for a single agent call (in seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Orchestrator configuration. Every key is optional in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Agent attempts per step beyond the first
    pub max_retries_per_step: u32,

    /// Maximum lessons generated concurrently
    pub parallel_lesson_batch_size: usize,

    /// QA score below which the course is flagged (it still completes)
    pub qa_min_score: f64,

    /// Persist each step's payload so the job can resume from it
    pub save_intermediate_results: bool,

    /// Apply deterministic corrections when a gate reports fixable issues
    pub enable_auto_fix: bool,

    /// Abort on Content/Assessments/QA gate failures too
    pub strict_late_gates: bool,

    /// Base delay for exponential backoff between agent attempts
    pub retry_backoff_base_ms: u64,

    /// Hard ceiling on the whole content fan-out (in seconds)
    pub content_batch_timeout_secs: u64,

    /// Ceiling on a whole generation run (in seconds)
    pub generation_timeout_secs: u64,

    /// How many failed runs a job may be resumed from
    pub job_max_retries: u32,

    /// Per-agent overrides keyed by agent kind
    pub agents: BTreeMap<AgentKind, AgentSettings>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries_per_step: 3,
            parallel_lesson_batch_size: 3,
            qa_min_score: 7.0,
            save_intermediate_results: true,
            enable_auto_fix: true,
            strict_late_gates: false,
            retry_backoff_base_ms: 1000,
            content_batch_timeout_secs: 300,
            generation_timeout_secs: 3600,
            job_max_retries: 3,
            agents: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.parallel_lesson_batch_size == 0 {
            anyhow::bail!("parallel_lesson_batch_size must be at least 1");
        }
        if !(0.0..=10.0).contains(&self.qa_min_score) {
            anyhow::bail!(
                "qa_min_score must be between 0 and 10 (got {})",
                self.qa_min_score
            );
        }
        if self.content_batch_timeout_secs == 0 {
            anyhow::bail!("content_batch_timeout_secs must be greater than zero");
        }
        if self.generation_timeout_secs == 0 {
            anyhow::bail!("generation_timeout_secs must be greater than zero");
        }
        for (kind, settings) in &self.agents {
            if settings.timeout_secs == Some(0) {
                anyhow::bail!("Agent '{}' has a zero timeout", kind);
            }
        }
        Ok(())
    }

    pub fn tier_for(&self, kind: AgentKind) -> ModelTier {
        self.agents
            .get(&kind)
            .and_then(|s| s.tier)
            .unwrap_or_else(|| kind.default_tier())
    }

    pub fn agent_timeout(&self, kind: AgentKind) -> Duration {
        let secs = self
            .agents
            .get(&kind)
            .and_then(|s| s.timeout_secs)
            .unwrap_or_else(|| kind.default_timeout_secs());
        Duration::from_secs(secs)
    }

    /// Delay before retrying after the given zero-based failed attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.retry_backoff_base_ms.saturating_mul(factor))
    }

    pub fn content_batch_timeout(&self) -> Duration {
        Duration::from_secs(self.content_batch_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn gate_policy(&self, step: PipelineStep) -> GatePolicy {
        if self.strict_late_gates {
            GatePolicy::Strict
        } else {
            step.default_gate_policy()
        }
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.retry_backoff_base_ms = base.as_millis() as u64;
        self
    }

    pub fn with_max_retries(mut self, max_retries_per_step: u32) -> Self {
        self.max_retries_per_step = max_retries_per_step;
        self
    }

    pub fn with_batch_size(mut self, parallel_lesson_batch_size: usize) -> Self {
        self.parallel_lesson_batch_size = parallel_lesson_batch_size;
        self
    }

    pub fn with_auto_fix(mut self, enable_auto_fix: bool) -> Self {
        self.enable_auto_fix = enable_auto_fix;
        self
    }

    pub fn with_agent_timeout(mut self, kind: AgentKind, timeout: Duration) -> Self {
        self.agents.entry(kind).or_default().timeout_secs = Some(timeout.as_secs().max(1));
        self
    }
}
