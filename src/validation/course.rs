//! Whole-course cross-check run before finalizing

use super::{GateBuilder, GateResult, IssueKind};
use crate::core::course::{Assessments, Curriculum, IntentResult, LessonContent, QaReport};
use std::collections::HashSet;

/// QA score at which a course is expected to be approved
const PASSING_QA_SCORE: f64 = 7.0;

/// Relative deviation between planned minutes and the intent's hours before warning
const MAX_DURATION_DEVIATION: f64 = 0.5;

/// Cross-check every artifact of a course before it is assembled
pub fn validate_full_course(
    intent: &IntentResult,
    curriculum: &Curriculum,
    lessons: &[LessonContent],
    assessments: &Assessments,
    qa_report: &QaReport,
) -> GateResult {
    let mut gate = GateBuilder::new();

    let expected = curriculum.lesson_count();
    if lessons.len() != expected {
        gate.issue(
            IssueKind::LessonCountMismatch,
            format!(
                "Curriculum has {} lessons but {} were generated",
                expected,
                lessons.len()
            ),
        );
    }

    let generated: HashSet<&str> = lessons.iter().map(|l| l.lesson_id.as_str()).collect();
    for (_, outline) in curriculum.lessons() {
        if !generated.contains(outline.id.as_str()) {
            gate.issue(
                IssueKind::MissingLessonContent,
                format!("Lesson {} has no generated content", outline.id),
            );
        }
    }

    let planned = curriculum.lesson_ids();
    for lesson in lessons {
        if !planned.contains(lesson.lesson_id.as_str()) {
            gate.warn(format!(
                "Generated lesson {} is not in the curriculum",
                lesson.lesson_id
            ));
        }
    }

    let quizzed = assessments.quizzed_lessons();
    let unquizzed = curriculum
        .lessons()
        .filter(|(_, l)| !quizzed.contains(l.id.as_str()))
        .count();
    if unquizzed > 0 {
        gate.warn(format!("{} lesson(s) lack quiz coverage", unquizzed));
    }

    let fallbacks = lessons.iter().filter(|l| l.is_fallback).count();
    if fallbacks > 0 {
        gate.warn(format!("{} lesson(s) use fallback content", fallbacks));
    }

    if qa_report.overall_score >= PASSING_QA_SCORE && !qa_report.approved {
        gate.warn(format!(
            "QA score {:.1} is passing but the course was not approved",
            qa_report.overall_score
        ));
    }

    if intent.estimated_hours > 0 {
        let planned_hours = curriculum.total_minutes() as f64 / 60.0;
        let target = intent.estimated_hours as f64;
        if (planned_hours - target).abs() / target > MAX_DURATION_DEVIATION {
            gate.warn(format!(
                "Lessons total {:.1}h against an estimated {}h",
                planned_hours, intent.estimated_hours
            ));
        }
    }

    gate.finish()
}
