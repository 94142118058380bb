//! Lesson content gate

use super::syntax::{self, SyntaxVerdict};
use super::{GateBuilder, GateResult, IssueKind};
use crate::core::course::{ContentBlock, Curriculum, LessonContent};
use std::collections::HashSet;

const MIN_WORDS: usize = 150;
const MAX_WORDS: usize = 3000;
const MIN_BLOCK_KINDS: usize = 2;
const MIN_SOLUTION_CHARS: usize = 15;

/// Validate one generated lesson.
///
/// `known_lesson_ids` is the set of lesson IDs in `curriculum`, passed in so
/// a batch of lessons can share it.
pub fn validate_content(
    lesson: &LessonContent,
    curriculum: &Curriculum,
    known_lesson_ids: &HashSet<&str>,
) -> GateResult {
    let mut gate = GateBuilder::new();

    if lesson.lesson_id.trim().is_empty() {
        gate.issue(IssueKind::SchemaViolation, "Lesson is missing its lesson_id");
    } else if !known_lesson_ids.contains(lesson.lesson_id.as_str()) {
        gate.issue(
            IssueKind::UnknownLessonId,
            format!("Lesson {} is not part of the curriculum", lesson.lesson_id),
        );
    } else if let Some((module, _)) = curriculum.find_lesson(&lesson.lesson_id) {
        if module.id != lesson.module_id {
            gate.warn(format!(
                "Lesson {} claims module {} but the curriculum places it in {}",
                lesson.lesson_id, lesson.module_id, module.id
            ));
        }
    }
    if lesson.title.trim().is_empty() {
        gate.issue(
            IssueKind::SchemaViolation,
            format!("Lesson {} has no title", lesson.lesson_id),
        );
    }
    if lesson.blocks.is_empty() {
        gate.issue(
            IssueKind::SchemaViolation,
            format!("Lesson {} has no content blocks", lesson.lesson_id),
        );
    }

    let verdicts: Vec<SyntaxVerdict> = lesson
        .blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Code {
                language, source, ..
            } => Some(syntax::check(language, source)),
            _ => None,
        })
        .filter(SyntaxVerdict::is_checkable)
        .collect();
    let failures: Vec<&String> = verdicts
        .iter()
        .filter_map(|v| match v {
            SyntaxVerdict::Invalid(message) => Some(message),
            _ => None,
        })
        .collect();
    if failures.len() * 3 > verdicts.len() {
        gate.issue(
            IssueKind::CodeSyntax,
            format!(
                "{} of {} code blocks in lesson {} fail syntax checks (first: {})",
                failures.len(),
                verdicts.len(),
                lesson.lesson_id,
                failures[0]
            ),
        );
    }

    let words = lesson.word_count();
    if words < MIN_WORDS {
        gate.warn(format!(
            "Lesson {} is short ({} words, expected at least {})",
            lesson.lesson_id, words, MIN_WORDS
        ));
    } else if words > MAX_WORDS {
        gate.warn(format!(
            "Lesson {} is long ({} words, expected at most {})",
            lesson.lesson_id, words, MAX_WORDS
        ));
    }

    let kinds: HashSet<&str> = lesson.blocks.iter().map(ContentBlock::kind).collect();
    if !lesson.blocks.is_empty() && kinds.len() < MIN_BLOCK_KINDS {
        gate.warn(format!(
            "Lesson {} uses only {} kind of content block",
            lesson.lesson_id,
            kinds.len()
        ));
    }

    for (n, exercise) in lesson.exercises.iter().enumerate() {
        if exercise.solution.trim().chars().count() < MIN_SOLUTION_CHARS {
            gate.warn(format!(
                "Exercise {} in lesson {} has a trivially short solution",
                n + 1,
                lesson.lesson_id
            ));
        }
    }

    gate.finish()
}
