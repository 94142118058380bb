//! Assessment design gate

use super::{GateBuilder, GateResult, IssueKind};
use crate::core::course::{Assessments, Curriculum, Question};
use std::collections::BTreeMap;

/// Multiple-choice questions needed before answer bias is checked
const BIAS_MIN_QUESTIONS: usize = 10;
const MIN_QUIZ_QUESTIONS: usize = 2;

/// Validate assessments against the curriculum they cover
pub fn validate_assessments(assessments: &Assessments, curriculum: &Curriculum) -> GateResult {
    let mut gate = GateBuilder::new();

    if assessments.quizzes.is_empty() && assessments.module_assessments.is_empty() {
        gate.issue(
            IssueKind::SchemaViolation,
            "No quizzes or module assessments were produced",
        );
        return gate.finish();
    }

    let lesson_ids = curriculum.lesson_ids();
    let module_ids = curriculum.module_ids();

    for quiz in &assessments.quizzes {
        if !lesson_ids.contains(quiz.lesson_id.as_str()) {
            gate.issue(
                IssueKind::DanglingReference,
                format!("Quiz references unknown lesson {}", quiz.lesson_id),
            );
        }
        if quiz.questions.len() < MIN_QUIZ_QUESTIONS {
            gate.warn(format!(
                "Quiz for lesson {} has only {} question(s)",
                quiz.lesson_id,
                quiz.questions.len()
            ));
        }
        check_questions(&mut gate, &format!("quiz {}", quiz.lesson_id), &quiz.questions);
    }

    for assessment in &assessments.module_assessments {
        if !module_ids.contains(assessment.module_id.as_str()) {
            gate.issue(
                IssueKind::DanglingReference,
                format!(
                    "Module assessment references unknown module {}",
                    assessment.module_id
                ),
            );
        }
        check_questions(
            &mut gate,
            &format!("module assessment {}", assessment.module_id),
            &assessment.questions,
        );
    }

    let quizzed = assessments.quizzed_lessons();
    let unquizzed: Vec<&str> = curriculum
        .lessons()
        .map(|(_, l)| l.id.as_str())
        .filter(|id| !quizzed.contains(id))
        .collect();
    if !unquizzed.is_empty() {
        gate.warn(format!(
            "{} lesson(s) have no quiz: {}",
            unquizzed.len(),
            unquizzed.join(", ")
        ));
    }

    if let Some(warning) = answer_bias(assessments) {
        gate.warn(warning);
    }

    gate.finish()
}

fn check_questions(gate: &mut GateBuilder, location: &str, questions: &[Question]) {
    for (n, question) in questions.iter().enumerate() {
        if question.prompt().trim().is_empty() {
            gate.issue(
                IssueKind::SchemaViolation,
                format!("Question {} in {} has an empty prompt", n + 1, location),
            );
        }
        if let Question::MultipleChoice {
            options,
            correct_index,
            ..
        } = question
        {
            if options.len() < 2 {
                gate.issue(
                    IssueKind::SchemaViolation,
                    format!("Question {} in {} has fewer than 2 options", n + 1, location),
                );
            } else if *correct_index >= options.len() {
                gate.issue(
                    IssueKind::SchemaViolation,
                    format!(
                        "Question {} in {} marks option {} correct but has {} options",
                        n + 1,
                        location,
                        correct_index,
                        options.len()
                    ),
                );
            }
        }
    }
}

/// Warn when one answer position holds more than half of all correct answers
fn answer_bias(assessments: &Assessments) -> Option<String> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for question in assessments.all_questions() {
        if let Question::MultipleChoice { correct_index, .. } = question {
            *counts.entry(*correct_index).or_default() += 1;
        }
    }
    let total: usize = counts.values().sum();
    if total < BIAS_MIN_QUESTIONS {
        return None;
    }
    counts
        .iter()
        .find(|(_, count)| **count * 2 > total)
        .map(|(index, count)| {
            format!(
                "Answer position {} is correct in {} of {} multiple-choice questions",
                index, count, total
            )
        })
}
