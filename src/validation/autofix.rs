//! Deterministic corrections for fixable gate issues
//!
//! Each transform is keyed by [`IssueKind`] and returns a corrected copy, or
//! `None` when none of the reported kinds applies to the artifact.

use super::intent::{MAX_HOURS, MIN_HOURS, MIN_OBJECTIVES};
use super::qa::{MAX_SCORE, MIN_SCORE};
use super::{GateResult, IssueKind};
use crate::core::course::{Assessments, Curriculum, IntentResult, QaReport};
use std::collections::HashSet;

/// Clamp the duration and pad objectives to the minimum
pub fn fix_intent(intent: &IntentResult, gate: &GateResult) -> Option<IntentResult> {
    let mut fixed = intent.clone();
    let mut changed = false;

    if gate.has_kind(IssueKind::DurationOutOfRange) {
        fixed.estimated_hours = fixed.estimated_hours.clamp(MIN_HOURS, MAX_HOURS);
        changed = true;
    }

    if gate.has_kind(IssueKind::MissingObjectives) {
        fixed.learning_objectives.retain(|o| !o.trim().is_empty());
        let topic = fixed.topic.trim().to_string();
        let generic = [
            format!("Explain the core concepts of {}", topic),
            format!("Apply {} techniques to practical problems", topic),
            format!("Evaluate common approaches and trade-offs in {}", topic),
        ];
        for objective in generic {
            if fixed.learning_objectives.len() >= MIN_OBJECTIVES {
                break;
            }
            if !fixed.learning_objectives.contains(&objective) {
                fixed.learning_objectives.push(objective);
            }
        }
        changed = true;
    }

    changed.then_some(fixed)
}

/// Renumber duplicate IDs and drop empty modules
pub fn fix_curriculum(curriculum: &Curriculum, gate: &GateResult) -> Option<Curriculum> {
    let mut fixed = curriculum.clone();
    let mut changed = false;

    if gate.has_kind(IssueKind::EmptyModule) {
        fixed.modules.retain(|m| !m.lessons.is_empty());
        changed = true;
    }

    if gate.has_kind(IssueKind::DuplicateModuleId) {
        let mut assigned: HashSet<String> = fixed.modules.iter().map(|m| m.id.clone()).collect();
        let mut seen = HashSet::new();
        for module in &mut fixed.modules {
            if !seen.insert(module.id.clone()) {
                module.id = unique_id(&module.id, &mut assigned);
            }
        }
        changed = true;
    }

    if gate.has_kind(IssueKind::DuplicateLessonId) {
        let mut assigned: HashSet<String> =
            fixed.lessons().map(|(_, l)| l.id.clone()).collect();
        let mut seen = HashSet::new();
        for module in &mut fixed.modules {
            for lesson in &mut module.lessons {
                if !seen.insert(lesson.id.clone()) {
                    lesson.id = unique_id(&lesson.id, &mut assigned);
                }
            }
        }
        changed = true;
    }

    changed.then_some(fixed)
}

/// Drop quizzes and module assessments that reference unknown IDs
pub fn fix_assessments(
    assessments: &Assessments,
    curriculum: &Curriculum,
    gate: &GateResult,
) -> Option<Assessments> {
    if !gate.has_kind(IssueKind::DanglingReference) {
        return None;
    }
    let lesson_ids = curriculum.lesson_ids();
    let module_ids = curriculum.module_ids();

    let mut fixed = assessments.clone();
    fixed
        .quizzes
        .retain(|q| lesson_ids.contains(q.lesson_id.as_str()));
    fixed
        .module_assessments
        .retain(|m| module_ids.contains(m.module_id.as_str()));
    Some(fixed)
}

/// Clamp scores and revoke approval contradicted by a critical finding
pub fn fix_qa(report: &QaReport, gate: &GateResult) -> Option<QaReport> {
    let mut fixed = report.clone();
    let mut changed = false;

    if gate.has_kind(IssueKind::ScoreOutOfRange) {
        let clamp = |s: f64| {
            if s.is_nan() {
                MIN_SCORE
            } else {
                s.clamp(MIN_SCORE, MAX_SCORE)
            }
        };
        fixed.overall_score = clamp(fixed.overall_score);
        let scores = &mut fixed.component_scores;
        scores.content_quality = clamp(scores.content_quality);
        scores.pedagogy = clamp(scores.pedagogy);
        scores.accuracy = clamp(scores.accuracy);
        scores.engagement = clamp(scores.engagement);
        changed = true;
    }

    if gate.has_kind(IssueKind::ApprovalContradiction) {
        fixed.approved = false;
        changed = true;
    }

    changed.then_some(fixed)
}

/// `base-2`, `base-3`, ... whichever is free first
fn unique_id(base: &str, assigned: &mut HashSet<String>) -> String {
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if assigned.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
