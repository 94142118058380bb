//! Pipeline step model

use crate::core::course::{
    Assessments, Curriculum, GeneratedCourse, IntentResult, LessonContent, QaReport,
};
use crate::validation::GateResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The six pipeline steps, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Intent,
    Curriculum,
    Content,
    Assessments,
    QaReview,
    Finalize,
}

/// How a step reacts to a failing gate that auto-fix could not repair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePolicy {
    /// Abort the run
    Strict,
    /// Log and continue with the artifact as is
    Lenient,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 6] = [
        PipelineStep::Intent,
        PipelineStep::Curriculum,
        PipelineStep::Content,
        PipelineStep::Assessments,
        PipelineStep::QaReview,
        PipelineStep::Finalize,
    ];

    /// Zero-based position in the canonical order
    pub fn index(self) -> usize {
        self as usize
    }

    /// One-based step number (matches the `stepN_*` job status)
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn next(self) -> Option<PipelineStep> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<PipelineStep> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::Intent => "intent",
            PipelineStep::Curriculum => "curriculum",
            PipelineStep::Content => "content",
            PipelineStep::Assessments => "assessments",
            PipelineStep::QaReview => "qa_review",
            PipelineStep::Finalize => "finalize",
        }
    }

    /// Progress window (start, end) in percent
    pub fn progress_range(self) -> (u8, u8) {
        match self {
            PipelineStep::Intent => (0, 15),
            PipelineStep::Curriculum => (15, 30),
            PipelineStep::Content => (30, 70),
            PipelineStep::Assessments => (70, 82),
            PipelineStep::QaReview => (82, 94),
            PipelineStep::Finalize => (94, 100),
        }
    }

    /// Default gate policy: strict early, lenient late
    pub fn default_gate_policy(self) -> GatePolicy {
        match self {
            PipelineStep::Intent | PipelineStep::Curriculum | PipelineStep::Finalize => {
                GatePolicy::Strict
            }
            PipelineStep::Content | PipelineStep::Assessments | PipelineStep::QaReview => {
                GatePolicy::Lenient
            }
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("Unknown pipeline step: {}", s))
    }
}

/// Typed output of a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepPayload {
    Intent(IntentResult),
    Curriculum(Curriculum),
    Content(Vec<LessonContent>),
    Assessments(Assessments),
    QaReview(QaReport),
    Finalize(Box<GeneratedCourse>),
}

impl StepPayload {
    pub fn step(&self) -> PipelineStep {
        match self {
            StepPayload::Intent(_) => PipelineStep::Intent,
            StepPayload::Curriculum(_) => PipelineStep::Curriculum,
            StepPayload::Content(_) => PipelineStep::Content,
            StepPayload::Assessments(_) => PipelineStep::Assessments,
            StepPayload::QaReview(_) => PipelineStep::QaReview,
            StepPayload::Finalize(_) => PipelineStep::Finalize,
        }
    }

    /// Serialize the inner record (untagged; the step is the storage key)
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            StepPayload::Intent(v) => serde_json::to_value(v),
            StepPayload::Curriculum(v) => serde_json::to_value(v),
            StepPayload::Content(v) => serde_json::to_value(v),
            StepPayload::Assessments(v) => serde_json::to_value(v),
            StepPayload::QaReview(v) => serde_json::to_value(v),
            StepPayload::Finalize(v) => serde_json::to_value(v),
        }
    }

    /// Rebuild a payload stored under `step`
    pub fn from_json(step: PipelineStep, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match step {
            PipelineStep::Intent => StepPayload::Intent(serde_json::from_value(value)?),
            PipelineStep::Curriculum => StepPayload::Curriculum(serde_json::from_value(value)?),
            PipelineStep::Content => StepPayload::Content(serde_json::from_value(value)?),
            PipelineStep::Assessments => StepPayload::Assessments(serde_json::from_value(value)?),
            PipelineStep::QaReview => StepPayload::QaReview(serde_json::from_value(value)?),
            PipelineStep::Finalize => StepPayload::Finalize(Box::new(serde_json::from_value(value)?)),
        })
    }
}

/// Recorded outcome of one completed step. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub step: PipelineStep,
    pub success: bool,
    pub payload: StepPayload,
    pub error: Option<String>,
    pub duration: Duration,
    /// Agent attempts beyond the first
    pub retries: u32,
    pub tokens_used: u64,
    pub gate: GateResult,
}

impl StepResult {
    pub fn new(payload: StepPayload, gate: GateResult) -> Self {
        Self {
            step: payload.step(),
            success: true,
            payload,
            error: None,
            duration: Duration::ZERO,
            retries: 0,
            tokens_used: 0,
            gate,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = tokens_used;
        self
    }
}
