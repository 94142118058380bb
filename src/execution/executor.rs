//! Step executor - runs one agent task with timeout and retry

use crate::agent::{AgentError, AgentExecutor, AgentOutput, AgentRequest, AgentResponse, AgentTask};
use crate::core::config::PipelineConfig;
use crate::core::step::PipelineStep;
use crate::execution::PipelineError;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Successful outcome of an agent call
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub output: AgentOutput,
    pub tokens_used: u64,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Executes agent tasks for individual steps
pub struct StepExecutor<A> {
    agent: Arc<A>,
    config: Arc<PipelineConfig>,
}

impl<A> Clone for StepExecutor<A> {
    fn clone(&self) -> Self {
        Self {
            agent: Arc::clone(&self.agent),
            config: Arc::clone(&self.config),
        }
    }
}

impl<A: AgentExecutor> StepExecutor<A> {
    pub fn new(agent: Arc<A>, config: Arc<PipelineConfig>) -> Self {
        Self { agent, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the request for `task` at the tier configured for its agent
    pub fn request(&self, task: AgentTask) -> AgentRequest {
        let tier = self.config.tier_for(task.kind());
        AgentRequest::new(task, tier)
    }

    /// Make one agent call bounded by the agent's timeout.
    ///
    /// Output of the wrong kind is rejected here so callers can match on it.
    pub async fn call_once(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        let limit = self.config.agent_timeout(request.agent);
        let response = match timeout(limit, self.agent.execute(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(AgentError::Timeout(limit.as_secs())),
        };

        let got = response.output.kind();
        if got != request.agent {
            return Err(AgentError::UnexpectedOutput {
                expected: request.agent,
                got,
            });
        }
        Ok(response)
    }

    /// Run `task` for `step`, retrying with exponential backoff.
    ///
    /// Makes at most `max_retries_per_step + 1` attempts.
    pub async fn run(&self, step: PipelineStep, task: AgentTask) -> Result<AgentRun, PipelineError> {
        let request = self.request(task);
        let max_retries = self.config.max_retries_per_step;
        info!("Executing step {} with {} ({:?} tier)", step, request.agent, request.tier);

        let mut attempt = 0;
        loop {
            match self.call_once(&request).await {
                Ok(response) => {
                    debug!(
                        "Step {} agent call succeeded on attempt {} ({} tokens)",
                        step,
                        attempt + 1,
                        response.usage.total()
                    );
                    return Ok(AgentRun {
                        output: response.output,
                        tokens_used: response.usage.total(),
                        attempts: attempt + 1,
                    });
                }
                Err(e) if attempt < max_retries => {
                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        "Step {} attempt {}/{} failed: {} (retrying in {:?})",
                        step,
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Step {} failed after {} attempt(s): {}", step, attempt + 1, e);
                    return Err(PipelineError::Agent {
                        step,
                        attempts: attempt + 1,
                        source: e,
                    });
                }
            }
        }
    }
}
