//! Lesson generation context - the per-lesson fan-out input

use crate::core::course::{Curriculum, Difficulty, IntentResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read-only projection of curriculum + intent for one lesson.
///
/// Built once per lesson before the content fan-out; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonGenerationContext {
    /// Position of the lesson in curriculum order
    pub position: usize,
    pub lesson_id: String,
    pub lesson_title: String,
    pub lesson_description: String,
    pub duration_minutes: u32,
    pub learning_outcomes: Vec<String>,
    pub module_id: String,
    pub module_title: String,
    pub module_position: usize,
    pub topic: String,
    pub difficulty: Difficulty,
    pub target_audience: String,
    /// Titles of the lessons listed as prerequisites
    pub prerequisite_titles: Vec<String>,
}

impl LessonGenerationContext {
    /// Build one context per lesson, in curriculum order
    pub fn build_all(curriculum: &Curriculum, intent: &IntentResult) -> Vec<Self> {
        let titles: HashMap<&str, &str> = curriculum
            .lessons()
            .map(|(_, l)| (l.id.as_str(), l.title.as_str()))
            .collect();

        let mut contexts = Vec::with_capacity(curriculum.lesson_count());
        for (module_position, module) in curriculum.modules.iter().enumerate() {
            for lesson in &module.lessons {
                // Unknown prerequisite IDs are dropped; the curriculum gate reports them.
                let prerequisite_titles = lesson
                    .prerequisites
                    .iter()
                    .filter_map(|id| titles.get(id.as_str()).map(|t| t.to_string()))
                    .collect();

                contexts.push(LessonGenerationContext {
                    position: contexts.len(),
                    lesson_id: lesson.id.clone(),
                    lesson_title: lesson.title.clone(),
                    lesson_description: lesson.description.clone(),
                    duration_minutes: lesson.duration_minutes,
                    learning_outcomes: lesson.learning_outcomes.clone(),
                    module_id: module.id.clone(),
                    module_title: module.title.clone(),
                    module_position,
                    topic: intent.topic.clone(),
                    difficulty: intent.difficulty,
                    target_audience: intent.target_audience.clone(),
                    prerequisite_titles,
                });
            }
        }
        contexts
    }
}
