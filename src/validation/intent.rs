//! Intent analysis gate

use super::{GateBuilder, GateResult, IssueKind};
use crate::core::course::{Difficulty, IntentResult};

/// Course length accepted without correction (hours)
pub const MIN_HOURS: u32 = 1;
pub const MAX_HOURS: u32 = 100;

/// Objectives a course should state at minimum
pub const MIN_OBJECTIVES: usize = 3;

const GENERIC_TOPICS: &[&str] = &[
    "art", "business", "coding", "cooking", "data", "design", "history", "language", "learning",
    "math", "music", "programming", "science", "software", "stuff", "technology", "things",
    "writing",
];

const ACTION_VERBS: &[&str] = &[
    "analyze", "apply", "assess", "build", "calculate", "choose", "compare", "configure",
    "construct", "create", "debug", "define", "demonstrate", "deploy", "describe", "design",
    "develop", "differentiate", "distinguish", "evaluate", "explain", "identify", "implement",
    "interpret", "list", "model", "optimize", "plan", "recognize", "solve", "summarize", "test",
    "use", "write",
];

const COMPLEX_TOPICS: &[&str] = &[
    "blockchain",
    "compiler",
    "cryptography",
    "deep learning",
    "distributed",
    "kubernetes",
    "machine learning",
    "neural network",
    "operating system",
    "quantum",
];

/// Validate the output of intent analysis
pub fn validate_intent(intent: &IntentResult) -> GateResult {
    let mut gate = GateBuilder::new();
    let topic = intent.topic.trim();

    if topic.is_empty() {
        gate.issue(IssueKind::EmptyTopic, "Intent has an empty topic");
    } else if is_vague(topic) {
        gate.warn(format!(
            "Topic '{}' is too vague; a narrower subject produces a better course",
            topic
        ));
    }

    if !(MIN_HOURS..=MAX_HOURS).contains(&intent.estimated_hours) {
        gate.issue(
            IssueKind::DurationOutOfRange,
            format!(
                "Estimated duration of {}h is outside {}-{}h",
                intent.estimated_hours, MIN_HOURS, MAX_HOURS
            ),
        );
    }

    let objectives: Vec<&str> = intent
        .learning_objectives
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect();
    if objectives.is_empty() {
        gate.issue(IssueKind::MissingObjectives, "Intent has no learning objectives");
    } else {
        if objectives.len() < MIN_OBJECTIVES {
            gate.warn(format!(
                "Only {} learning objective(s); at least {} expected",
                objectives.len(),
                MIN_OBJECTIVES
            ));
        }
        let without_verb = objectives.iter().filter(|o| !has_action_verb(o)).count();
        if without_verb * 2 > objectives.len() {
            gate.warn(format!(
                "{} of {} learning objectives lack a measurable action verb",
                without_verb,
                objectives.len()
            ));
        }
    }

    if let Some(mismatch) = duration_mismatch(intent) {
        gate.warn(mismatch);
    }

    gate.finish()
}

fn is_vague(topic: &str) -> bool {
    let mut words = topic.split_whitespace();
    match (words.next(), words.next()) {
        (Some(word), None) => GENERIC_TOPICS.contains(&word.to_lowercase().as_str()),
        _ => false,
    }
}

pub(crate) fn has_action_verb(objective: &str) -> bool {
    objective
        .split(|c: char| !c.is_alphabetic())
        .any(|word| ACTION_VERBS.contains(&word.to_lowercase().as_str()))
}

fn duration_mismatch(intent: &IntentResult) -> Option<String> {
    let hours = intent.estimated_hours;
    if hours == 0 {
        return None;
    }
    let topic = intent.topic.to_lowercase();

    if intent.difficulty == Difficulty::Advanced && hours < 3 {
        return Some(format!("Advanced course estimated at only {}h", hours));
    }
    if hours < 5 {
        if let Some(keyword) = COMPLEX_TOPICS.iter().find(|k| topic.contains(*k)) {
            return Some(format!(
                "Topic involving '{}' is unlikely to fit in {}h",
                keyword, hours
            ));
        }
    }
    if intent.difficulty == Difficulty::Beginner && hours > 80 {
        return Some(format!("Beginner course estimated at {}h", hours));
    }
    None
}
