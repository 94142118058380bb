//! Execution state models

use crate::core::course::{
    Assessments, CourseRequest, Curriculum, GeneratedCourse, IntentResult, LessonContent, QaReport,
};
use crate::core::step::{PipelineStep, StepPayload, StepResult};
use crate::persistence::JobRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Durable status of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum JobStatus {
    /// Job has been created but not started
    Pending,
    /// Job has been picked up by an orchestrator
    Running,
    /// Job is executing the given step
    Step(PipelineStep),
    /// Course was generated
    Completed,
    /// Job failed
    Failed,
    /// Job was cancelled between steps
    Cancelled,
}

impl JobStatus {
    /// Whether an orchestrator is (or was, if it crashed) working on the job
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::Step(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Step(PipelineStep::Intent) => "step1_intent",
            JobStatus::Step(PipelineStep::Curriculum) => "step2_curriculum",
            JobStatus::Step(PipelineStep::Content) => "step3_content",
            JobStatus::Step(PipelineStep::Assessments) => "step4_assessments",
            JobStatus::Step(PipelineStep::QaReview) => "step5_qa_review",
            JobStatus::Step(PipelineStep::Finalize) => "step6_finalize",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => PipelineStep::ALL
                .iter()
                .map(|step| JobStatus::Step(*step))
                .find(|status| status.as_str() == other)
                .ok_or_else(|| format!("Unknown job status: {}", other)),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Violations of the in-memory state invariants
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("Step {got} recorded out of order (expected {expected})")]
    OutOfOrder {
        expected: PipelineStep,
        got: PipelineStep,
    },

    #[error("Pipeline already finished; cannot record {0}")]
    AlreadyFinished(PipelineStep),

    #[error("Artifact from step {0} is not available")]
    MissingArtifact(PipelineStep),

    #[error("Stored result for step {step} is unreadable: {message}")]
    CorruptResult { step: PipelineStep, message: String },
}

/// In-memory working set for one job run.
///
/// `completed_steps` is always a prefix of the canonical step order and every
/// completed step has a recorded [`StepResult`].
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub job_id: String,
    pub request: CourseRequest,
    current_step: PipelineStep,
    completed_steps: Vec<PipelineStep>,
    results: BTreeMap<PipelineStep, StepResult>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_duration: Duration,
}

impl PipelineState {
    /// Create a fresh state for a new run
    pub fn new(job_id: impl Into<String>, request: CourseRequest) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            request,
            current_step: PipelineStep::Intent,
            completed_steps: Vec::new(),
            results: BTreeMap::new(),
            started_at: now,
            updated_at: now,
            total_duration: Duration::ZERO,
        }
    }

    /// Rebuild state from a durable job record.
    ///
    /// Stored payloads are replayed in canonical order; replay stops at the
    /// first step without a stored payload so the prefix invariant holds.
    pub fn restore(job: &JobRecord) -> Result<Self, StateError> {
        let mut state = Self::new(job.id.clone(), job.request());
        if let Some(started_at) = job.started_at {
            state.started_at = started_at;
        }

        for step in PipelineStep::ALL {
            let Some(stored) = job.step_results.get(step.as_str()) else {
                break;
            };
            let Some(value) = stored.payload.clone() else {
                debug!("Step {} of job {} has no stored payload; it will run again", step, job.id);
                break;
            };

            let payload = StepPayload::from_json(step, value).map_err(|e| StateError::CorruptResult {
                step,
                message: e.to_string(),
            })?;

            let result = StepResult::new(payload, stored.gate.clone())
                .with_duration(Duration::from_secs_f64(stored.elapsed_secs.max(0.0)))
                .with_retries(stored.attempts.saturating_sub(1))
                .with_tokens(stored.tokens_used);
            state.record(result)?;
        }

        let later_steps = job
            .step_results
            .keys()
            .filter_map(|k| k.parse::<PipelineStep>().ok())
            .filter(|s| !state.is_completed(*s))
            .count();
        if later_steps > 0 {
            warn!(
                "Job {} has {} stored step result(s) past the resume point; they will be regenerated",
                job.id, later_steps
            );
        }

        Ok(state)
    }

    /// Next step to run (or `Finalize` once the run is finished)
    pub fn current_step(&self) -> PipelineStep {
        self.current_step
    }

    pub fn completed_steps(&self) -> &[PipelineStep] {
        &self.completed_steps
    }

    pub fn is_completed(&self, step: PipelineStep) -> bool {
        self.results.contains_key(&step)
    }

    pub fn is_finished(&self) -> bool {
        self.is_completed(PipelineStep::Finalize)
    }

    pub fn result(&self, step: PipelineStep) -> Option<&StepResult> {
        self.results.get(&step)
    }

    /// Record a completed step and advance.
    pub fn record(&mut self, result: StepResult) -> Result<(), StateError> {
        if self.is_finished() {
            return Err(StateError::AlreadyFinished(result.step));
        }
        if result.step != self.current_step {
            return Err(StateError::OutOfOrder {
                expected: self.current_step,
                got: result.step,
            });
        }

        let step = result.step;
        self.total_duration += result.duration;
        self.completed_steps.push(step);
        self.results.insert(step, result);
        if let Some(next) = step.next() {
            self.current_step = next;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn tokens_used(&self) -> u64 {
        self.results.values().map(|r| r.tokens_used).sum()
    }

    /// Progress percent reached so far
    pub fn progress(&self) -> u8 {
        self.completed_steps
            .last()
            .map(|s| s.progress_range().1)
            .unwrap_or(0)
    }

    pub fn intent(&self) -> Option<&IntentResult> {
        match self.results.get(&PipelineStep::Intent).map(|r| &r.payload) {
            Some(StepPayload::Intent(v)) => Some(v),
            _ => None,
        }
    }

    pub fn curriculum(&self) -> Option<&Curriculum> {
        match self.results.get(&PipelineStep::Curriculum).map(|r| &r.payload) {
            Some(StepPayload::Curriculum(v)) => Some(v),
            _ => None,
        }
    }

    pub fn lessons(&self) -> Option<&[LessonContent]> {
        match self.results.get(&PipelineStep::Content).map(|r| &r.payload) {
            Some(StepPayload::Content(v)) => Some(v),
            _ => None,
        }
    }

    pub fn assessments(&self) -> Option<&Assessments> {
        match self.results.get(&PipelineStep::Assessments).map(|r| &r.payload) {
            Some(StepPayload::Assessments(v)) => Some(v),
            _ => None,
        }
    }

    pub fn qa_report(&self) -> Option<&QaReport> {
        match self.results.get(&PipelineStep::QaReview).map(|r| &r.payload) {
            Some(StepPayload::QaReview(v)) => Some(v),
            _ => None,
        }
    }

    pub fn course(&self) -> Option<&GeneratedCourse> {
        match self.results.get(&PipelineStep::Finalize).map(|r| &r.payload) {
            Some(StepPayload::Finalize(v)) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn require_intent(&self) -> Result<&IntentResult, StateError> {
        self.intent().ok_or(StateError::MissingArtifact(PipelineStep::Intent))
    }

    pub fn require_curriculum(&self) -> Result<&Curriculum, StateError> {
        self.curriculum()
            .ok_or(StateError::MissingArtifact(PipelineStep::Curriculum))
    }

    pub fn require_lessons(&self) -> Result<&[LessonContent], StateError> {
        self.lessons().ok_or(StateError::MissingArtifact(PipelineStep::Content))
    }

    pub fn require_assessments(&self) -> Result<&Assessments, StateError> {
        self.assessments()
            .ok_or(StateError::MissingArtifact(PipelineStep::Assessments))
    }

    pub fn require_qa_report(&self) -> Result<&QaReport, StateError> {
        self.qa_report()
            .ok_or(StateError::MissingArtifact(PipelineStep::QaReview))
    }

    /// Gate warnings accumulated across all recorded steps, prefixed by step
    pub fn gate_warnings(&self) -> Vec<String> {
        self.results
            .values()
            .flat_map(|r| r.gate.warnings.iter().map(move |w| format!("[{}] {}", r.step, w)))
            .collect()
    }
}
