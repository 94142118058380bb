//! Generation agents the pipeline delegates to

pub mod client;
pub mod response;
pub mod subprocess_client;
pub mod task;

use crate::core::step::PipelineStep;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use client::AgentClientConfig;
pub use response::{AgentError, AgentResponse, TokenUsage};
pub use subprocess_client::CommandAgent;
pub use task::{AgentOutput, AgentTask};

/// Trait for agent execution - allows for different implementations
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run one task and return its typed output
    async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError>;
}

/// The specialized agents, one per generative step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    IntentAnalyzer,
    CurriculumDesigner,
    ContentAuthor,
    AssessmentDesigner,
    QualityReviewer,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::IntentAnalyzer => "intent_analyzer",
            AgentKind::CurriculumDesigner => "curriculum_designer",
            AgentKind::ContentAuthor => "content_author",
            AgentKind::AssessmentDesigner => "assessment_designer",
            AgentKind::QualityReviewer => "quality_reviewer",
        }
    }

    /// Agent that produces the given step's output (Finalize has none)
    pub fn for_step(step: PipelineStep) -> Option<AgentKind> {
        match step {
            PipelineStep::Intent => Some(AgentKind::IntentAnalyzer),
            PipelineStep::Curriculum => Some(AgentKind::CurriculumDesigner),
            PipelineStep::Content => Some(AgentKind::ContentAuthor),
            PipelineStep::Assessments => Some(AgentKind::AssessmentDesigner),
            PipelineStep::QaReview => Some(AgentKind::QualityReviewer),
            PipelineStep::Finalize => None,
        }
    }

    pub fn default_tier(self) -> ModelTier {
        match self {
            AgentKind::IntentAnalyzer => ModelTier::Fast,
            AgentKind::CurriculumDesigner | AgentKind::QualityReviewer => ModelTier::Premium,
            AgentKind::ContentAuthor | AgentKind::AssessmentDesigner => ModelTier::Balanced,
        }
    }

    pub fn default_timeout_secs(self) -> u64 {
        match self {
            AgentKind::IntentAnalyzer => 60,
            AgentKind::ContentAuthor => 180,
            AgentKind::CurriculumDesigner
            | AgentKind::AssessmentDesigner
            | AgentKind::QualityReviewer => 120,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model capability tier requested from the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Balanced,
    Premium,
}

/// A task plus the tier it should run on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub agent: AgentKind,
    pub tier: ModelTier,
    pub task: AgentTask,
}

impl AgentRequest {
    pub fn new(task: AgentTask, tier: ModelTier) -> Self {
        Self {
            agent: task.kind(),
            tier,
            task,
        }
    }
}
