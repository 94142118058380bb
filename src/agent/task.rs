//! Typed agent inputs and outputs

use super::AgentKind;
use crate::core::context::LessonGenerationContext;
use crate::core::course::{
    Assessments, CoursePreferences, CourseRequest, Curriculum, IntentResult, LessonContent,
    QaReport,
};
use serde::{Deserialize, Serialize};

/// Input handed to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum AgentTask {
    AnalyzeIntent {
        request: CourseRequest,
    },
    DesignCurriculum {
        intent: IntentResult,
        preferences: CoursePreferences,
    },
    WriteLesson {
        context: LessonGenerationContext,
    },
    DesignAssessments {
        intent: IntentResult,
        curriculum: Curriculum,
        lessons: Vec<LessonContent>,
    },
    ReviewQuality {
        intent: IntentResult,
        curriculum: Curriculum,
        lessons: Vec<LessonContent>,
        assessments: Assessments,
    },
}

impl AgentTask {
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentTask::AnalyzeIntent { .. } => AgentKind::IntentAnalyzer,
            AgentTask::DesignCurriculum { .. } => AgentKind::CurriculumDesigner,
            AgentTask::WriteLesson { .. } => AgentKind::ContentAuthor,
            AgentTask::DesignAssessments { .. } => AgentKind::AssessmentDesigner,
            AgentTask::ReviewQuality { .. } => AgentKind::QualityReviewer,
        }
    }
}

/// Output returned by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AgentOutput {
    Intent(IntentResult),
    Curriculum(Curriculum),
    Lesson(LessonContent),
    Assessments(Assessments),
    QaReport(QaReport),
}

impl AgentOutput {
    /// Agent kind expected to produce this output
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentOutput::Intent(_) => AgentKind::IntentAnalyzer,
            AgentOutput::Curriculum(_) => AgentKind::CurriculumDesigner,
            AgentOutput::Lesson(_) => AgentKind::ContentAuthor,
            AgentOutput::Assessments(_) => AgentKind::AssessmentDesigner,
            AgentOutput::QaReport(_) => AgentKind::QualityReviewer,
        }
    }
}
