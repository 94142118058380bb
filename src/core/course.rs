//! Course domain records produced by the generation steps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Target difficulty of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

/// Caller preferences attached to a generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoursePreferences {
    #[serde(default)]
    pub difficulty: Option<Difficulty>,

    /// Desired total course length in hours
    #[serde(default)]
    pub duration_hours: Option<u32>,

    /// Natural language of the generated material (e.g. "en")
    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub learning_style: Option<String>,
}

/// A request to generate one course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRequest {
    pub user_id: String,
    pub prompt: String,
    #[serde(default)]
    pub preferences: CoursePreferences,
}

impl CourseRequest {
    pub fn new(user_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            prompt: prompt.into(),
            preferences: CoursePreferences::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: CoursePreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

/// Output of the intent analysis step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub topic: String,
    #[serde(default)]
    pub subject_area: String,
    pub difficulty: Difficulty,
    pub estimated_hours: u32,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
}

/// Output of the curriculum design step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curriculum {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub modules: Vec<Module>,
}

impl Curriculum {
    /// All lessons in curriculum order, paired with their module
    pub fn lessons(&self) -> impl Iterator<Item = (&Module, &LessonOutline)> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter().map(move |l| (m, l)))
    }

    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    pub fn lesson_ids(&self) -> HashSet<&str> {
        self.lessons().map(|(_, l)| l.id.as_str()).collect()
    }

    pub fn module_ids(&self) -> HashSet<&str> {
        self.modules.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn find_lesson(&self, lesson_id: &str) -> Option<(&Module, &LessonOutline)> {
        self.lessons().find(|(_, l)| l.id == lesson_id)
    }

    /// Total planned lesson time in minutes
    pub fn total_minutes(&self) -> u32 {
        self.lessons().map(|(_, l)| l.duration_minutes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub lessons: Vec<LessonOutline>,
}

/// A lesson as planned by the curriculum (no content yet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonOutline {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_lesson_minutes")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    /// IDs of lessons that should be taken first
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

fn default_lesson_minutes() -> u32 {
    20
}

/// One block of authored lesson material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        body: String,
    },
    Code {
        language: String,
        source: String,
        #[serde(default)]
        explanation: Option<String>,
    },
    Example {
        title: String,
        body: String,
    },
    Callout {
        #[serde(default)]
        kind: String,
        body: String,
    },
    KeyPoints {
        points: Vec<String>,
    },
}

impl ContentBlock {
    /// Stable name of the block type
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Code { .. } => "code",
            ContentBlock::Example { .. } => "example",
            ContentBlock::Callout { .. } => "callout",
            ContentBlock::KeyPoints { .. } => "key_points",
        }
    }

    /// Prose word count (code is not counted)
    pub fn word_count(&self) -> usize {
        let words = |s: &str| s.split_whitespace().count();
        match self {
            ContentBlock::Text { body } => words(body),
            ContentBlock::Code { explanation, .. } => explanation.as_deref().map_or(0, words),
            ContentBlock::Example { title, body } => words(title) + words(body),
            ContentBlock::Callout { body, .. } => words(body),
            ContentBlock::KeyPoints { points } => points.iter().map(|p| words(p)).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub prompt: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Authored content for one lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    pub lesson_id: String,
    pub module_id: String,
    pub title: String,
    pub blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub summary: String,
    /// Set when the lesson was synthesized from a template instead of generated
    #[serde(default)]
    pub is_fallback: bool,
}

impl LessonContent {
    pub fn word_count(&self) -> usize {
        let summary = self.summary.split_whitespace().count();
        self.blocks.iter().map(ContentBlock::word_count).sum::<usize>() + summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    MultipleChoice {
        prompt: String,
        options: Vec<String>,
        correct_index: usize,
        #[serde(default)]
        explanation: String,
    },
    TrueFalse {
        prompt: String,
        answer: bool,
    },
    ShortAnswer {
        prompt: String,
        reference_answer: String,
    },
}

impl Question {
    pub fn prompt(&self) -> &str {
        match self {
            Question::MultipleChoice { prompt, .. }
            | Question::TrueFalse { prompt, .. }
            | Question::ShortAnswer { prompt, .. } => prompt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub lesson_id: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAssessment {
    pub module_id: String,
    #[serde(default)]
    pub title: String,
    pub questions: Vec<Question>,
}

/// Output of the assessment design step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessments {
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub module_assessments: Vec<ModuleAssessment>,
}

impl Assessments {
    /// Every question across quizzes and module assessments
    pub fn all_questions(&self) -> impl Iterator<Item = &Question> {
        self.quizzes
            .iter()
            .flat_map(|q| q.questions.iter())
            .chain(self.module_assessments.iter().flat_map(|m| m.questions.iter()))
    }

    pub fn quizzed_lessons(&self) -> HashSet<&str> {
        self.quizzes.iter().map(|q| q.lesson_id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single finding from quality review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaFinding {
    pub severity: Severity,
    #[serde(default)]
    pub location: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub content_quality: f64,
    pub pedagogy: f64,
    pub accuracy: f64,
    pub engagement: f64,
}

impl ComponentScores {
    pub fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("content_quality", self.content_quality),
            ("pedagogy", self.pedagogy),
            ("accuracy", self.accuracy),
            ("engagement", self.engagement),
        ]
    }
}

/// Output of the quality review step. Scores are on a 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    pub overall_score: f64,
    pub approved: bool,
    #[serde(default)]
    pub component_scores: ComponentScores,
    #[serde(default)]
    pub issues: Vec<QaFinding>,
    #[serde(default)]
    pub summary: String,
}

impl QaReport {
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }
}

/// Bookkeeping attached to a finished course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_duration_secs: f64,
    pub tokens_used: u64,
    pub fallback_lessons: usize,
    /// QA score fell below the configured minimum
    pub qa_flagged: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// The final assembled artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCourse {
    pub job_id: String,
    pub intent: IntentResult,
    pub curriculum: Curriculum,
    pub lessons: Vec<LessonContent>,
    pub assessments: Assessments,
    pub qa_report: QaReport,
    pub metadata: CourseMetadata,
}
