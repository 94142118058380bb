//! Curriculum design gate

use super::{GateBuilder, GateResult, IssueKind};
use crate::core::course::{Curriculum, IntentResult};
use std::collections::HashSet;

/// Acceptable average lesson length (minutes)
const MIN_AVG_LESSON_MINUTES: u32 = 10;
const MAX_AVG_LESSON_MINUTES: u32 = 45;

/// Acceptable module count for a course of `hours` hours
pub fn module_count_range(hours: u32) -> (usize, usize) {
    let hours = hours as usize;
    let lo = (hours / 5).max(2);
    let hi = hours.min(12).max(lo);
    (lo, hi)
}

/// Validate a curriculum against the intent it was designed for
pub fn validate_curriculum(curriculum: &Curriculum, intent: &IntentResult) -> GateResult {
    let mut gate = GateBuilder::new();

    if curriculum.modules.is_empty() || curriculum.lesson_count() == 0 {
        gate.issue(IssueKind::EmptyCurriculum, "Curriculum contains no lessons");
        return gate.finish();
    }

    let mut module_ids = HashSet::new();
    for module in &curriculum.modules {
        if !module_ids.insert(module.id.as_str()) {
            gate.issue(
                IssueKind::DuplicateModuleId,
                format!("Duplicate module ID: {}", module.id),
            );
        }
        if module.lessons.is_empty() {
            gate.issue(
                IssueKind::EmptyModule,
                format!("Module {} has no lessons", module.id),
            );
        }
    }

    let mut lesson_ids = HashSet::new();
    for (_, lesson) in curriculum.lessons() {
        if !lesson_ids.insert(lesson.id.as_str()) {
            gate.issue(
                IssueKind::DuplicateLessonId,
                format!("Duplicate lesson ID: {}", lesson.id),
            );
        }
    }

    let (lo, hi) = module_count_range(intent.estimated_hours);
    let count = curriculum.modules.len();
    if count < lo || count > hi {
        gate.warn(format!(
            "{} modules for a {}h course; expected {}-{}",
            count, intent.estimated_hours, lo, hi
        ));
    }

    let sizes: Vec<usize> = curriculum
        .modules
        .iter()
        .map(|m| m.lessons.len())
        .filter(|n| *n > 0)
        .collect();
    if let (Some(min), Some(max)) = (sizes.iter().min(), sizes.iter().max()) {
        if *max > 2 * min + 1 {
            gate.warn(format!(
                "Unbalanced modules: largest has {} lessons, smallest has {}",
                max, min
            ));
        }
    }

    let avg = curriculum.total_minutes() / curriculum.lesson_count() as u32;
    if !(MIN_AVG_LESSON_MINUTES..=MAX_AVG_LESSON_MINUTES).contains(&avg) {
        gate.warn(format!(
            "Average lesson length is {} minutes; expected {}-{}",
            avg, MIN_AVG_LESSON_MINUTES, MAX_AVG_LESSON_MINUTES
        ));
    }

    for (_, lesson) in curriculum.lessons() {
        for prerequisite in &lesson.prerequisites {
            if !lesson_ids.contains(prerequisite.as_str()) {
                gate.warn(format!(
                    "Lesson {} lists unknown prerequisite {}",
                    lesson.id, prerequisite
                ));
            }
        }
    }

    gate.finish()
}
