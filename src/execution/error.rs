//! Pipeline-level errors surfaced at the `generate` boundary

use crate::agent::AgentError;
use crate::core::state::StateError;
use crate::core::step::PipelineStep;
use crate::persistence::StoreError;
use thiserror::Error;

/// Why a generation run failed.
///
/// Every variant that can be tied to a step carries it, and gate failures
/// carry the gate's blocking issues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Step {step} failed after {attempts} agent attempt(s): {source}")]
    Agent {
        step: PipelineStep,
        attempts: u32,
        #[source]
        source: AgentError,
    },

    #[error("Step {step} failed validation: {}", issues.join("; "))]
    Gate {
        step: PipelineStep,
        issues: Vec<String>,
    },

    #[error("Job store failed: {source}")]
    Store {
        step: Option<PipelineStep>,
        #[source]
        source: StoreError,
    },

    #[error("Invalid pipeline state: {0}")]
    State(#[from] StateError),

    #[error("Job {job_id} was cancelled before step {step}")]
    Cancelled { job_id: String, step: PipelineStep },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} has used all {max_retries} retries")]
    RetryBudgetExhausted { job_id: String, max_retries: u32 },

    #[error("Generation timed out after {secs} seconds")]
    Timeout {
        step: Option<PipelineStep>,
        secs: u64,
    },
}

impl PipelineError {
    pub(crate) fn store(step: Option<PipelineStep>) -> impl FnOnce(StoreError) -> PipelineError {
        move |source| PipelineError::Store { step, source }
    }

    /// The step that failed, when known
    pub fn step(&self) -> Option<PipelineStep> {
        match self {
            PipelineError::Agent { step, .. }
            | PipelineError::Gate { step, .. }
            | PipelineError::Cancelled { step, .. } => Some(*step),
            PipelineError::Store { step, .. } | PipelineError::Timeout { step, .. } => *step,
            PipelineError::State(StateError::OutOfOrder { got, .. }) => Some(*got),
            PipelineError::State(StateError::AlreadyFinished(step))
            | PipelineError::State(StateError::MissingArtifact(step))
            | PipelineError::State(StateError::CorruptResult { step, .. }) => Some(*step),
            PipelineError::JobNotFound(_) | PipelineError::RetryBudgetExhausted { .. } => None,
        }
    }

    /// Blocking gate issues behind the failure (empty for non-gate failures)
    pub fn issues(&self) -> &[String] {
        match self {
            PipelineError::Gate { issues, .. } => issues,
            _ => &[],
        }
    }

    /// Infrastructure failure rather than a content or logic failure
    pub fn is_store_error(&self) -> bool {
        matches!(self, PipelineError::Store { .. })
    }

    /// Whether the failure should be recorded on the job.
    ///
    /// Lease conflicts belong to another run, and lookups that never started
    /// a run leave the job untouched.
    pub(crate) fn marks_job(&self) -> bool {
        !matches!(
            self,
            PipelineError::JobNotFound(_)
                | PipelineError::RetryBudgetExhausted { .. }
                | PipelineError::Store {
                    source: StoreError::LeaseHeld { .. } | StoreError::NotFound(_),
                    ..
                }
        )
    }
}
