//! Deterministic validation gates
//!
//! One gate per pipeline step plus a whole-course cross-check. Gates never
//! call an agent and never touch the store: identical input always yields an
//! identical [`GateResult`].

pub mod assessments;
pub mod autofix;
pub mod content;
pub mod course;
pub mod curriculum;
pub mod intent;
pub mod qa;
pub mod syntax;

pub use assessments::validate_assessments;
pub use content::validate_content;
pub use course::validate_full_course;
pub use curriculum::validate_curriculum;
pub use intent::validate_intent;
pub use qa::validate_qa;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a blocking gate issue.
///
/// Auto-fix transforms are keyed by kind, never by message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    EmptyTopic,
    DurationOutOfRange,
    MissingObjectives,
    EmptyCurriculum,
    EmptyModule,
    DuplicateModuleId,
    DuplicateLessonId,
    SchemaViolation,
    UnknownLessonId,
    CodeSyntax,
    DanglingReference,
    ApprovalContradiction,
    ScoreOutOfRange,
    LessonCountMismatch,
    MissingLessonContent,
}

impl IssueKind {
    /// Whether a deterministic correction exists for this kind
    pub fn is_fixable(self) -> bool {
        matches!(
            self,
            IssueKind::DurationOutOfRange
                | IssueKind::MissingObjectives
                | IssueKind::EmptyModule
                | IssueKind::DuplicateModuleId
                | IssueKind::DuplicateLessonId
                | IssueKind::DanglingReference
                | IssueKind::ApprovalContradiction
                | IssueKind::ScoreOutOfRange
        )
    }
}

/// A blocking problem found by a gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl GateIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for GateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Verdict of a gate.
///
/// `passed` is false exactly when `issues` is non-empty; warnings never
/// affect it. `fixable` is true when every issue has a known correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    #[serde(default)]
    pub issues: Vec<GateIssue>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub fixable: bool,
}

impl GateResult {
    /// A passing verdict with nothing to report
    pub fn pass() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
            warnings: Vec::new(),
            fixable: false,
        }
    }

    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message.clone()).collect()
    }

    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    /// Merge several verdicts into one (e.g. one per lesson)
    pub fn combine(results: impl IntoIterator<Item = GateResult>) -> GateResult {
        let mut gate = GateBuilder::new();
        for result in results {
            gate.issues.extend(result.issues);
            gate.warnings.extend(result.warnings);
        }
        gate.finish()
    }
}

impl Default for GateResult {
    fn default() -> Self {
        Self::pass()
    }
}

/// Accumulates findings while a gate runs
#[derive(Debug, Default)]
pub(crate) struct GateBuilder {
    issues: Vec<GateIssue>,
    warnings: Vec<String>,
}

impl GateBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn issue(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(GateIssue::new(kind, message));
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub(crate) fn finish(self) -> GateResult {
        let passed = self.issues.is_empty();
        let fixable = !passed && self.issues.iter().all(|i| i.kind.is_fixable());
        GateResult {
            passed,
            issues: self.issues,
            warnings: self.warnings,
            fixable,
        }
    }
}
