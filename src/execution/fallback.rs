//! Templated lessons used when generation fails for a lesson

use crate::core::context::LessonGenerationContext;
use crate::core::course::{ContentBlock, LessonContent};

/// Build placeholder content for a lesson from its context alone.
///
/// The result is structurally valid, references the original lesson ID and
/// is marked with `is_fallback`.
pub fn fallback_lesson(context: &LessonGenerationContext) -> LessonContent {
    let mut intro = format!(
        "This lesson covers {}, part of the {} module of a {} course on {}.",
        context.lesson_title, context.module_title, context.difficulty, context.topic
    );
    if !context.lesson_description.is_empty() {
        intro.push(' ');
        intro.push_str(&context.lesson_description);
    }

    let outcomes = if context.learning_outcomes.is_empty() {
        vec![format!("Explain the main ideas behind {}", context.lesson_title)]
    } else {
        context.learning_outcomes.clone()
    };

    let mut blocks = vec![ContentBlock::Text { body: intro }];
    if !context.prerequisite_titles.is_empty() {
        blocks.push(ContentBlock::Callout {
            kind: "note".to_string(),
            body: format!(
                "Review these lessons first: {}.",
                context.prerequisite_titles.join(", ")
            ),
        });
    }
    blocks.push(ContentBlock::KeyPoints {
        points: outcomes.clone(),
    });

    LessonContent {
        lesson_id: context.lesson_id.clone(),
        module_id: context.module_id.clone(),
        title: context.lesson_title.clone(),
        blocks,
        exercises: Vec::new(),
        summary: format!(
            "By the end of this lesson you should be able to: {}.",
            outcomes.join("; ")
        ),
        is_fallback: true,
    }
}
