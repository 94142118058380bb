//! Test: Lesson Fan-out - bounded concurrency, timeouts and fallbacks

use crate::helpers::*;
use crate::mock_agent::MockAgent;
use coursegen::agent::AgentKind;
use coursegen::core::{Curriculum, LessonGenerationContext, LessonOutline, Module};
use coursegen::execution::{ParallelContentExecutor, StepExecutor};
use std::sync::Arc;
use std::time::Duration;

/// One module with `n` lessons
fn contexts(n: usize) -> Vec<LessonGenerationContext> {
    let curriculum = Curriculum {
        title: "Big course".to_string(),
        description: String::new(),
        modules: vec![Module {
            id: "m1".to_string(),
            title: "Everything".to_string(),
            description: String::new(),
            lessons: (0..n)
                .map(|i| LessonOutline {
                    id: format!("l{}", i),
                    title: format!("Lesson {}", i),
                    description: String::new(),
                    duration_minutes: 20,
                    learning_outcomes: vec![format!("Explain topic {}", i)],
                    prerequisites: vec![],
                })
                .collect(),
        }],
    };
    LessonGenerationContext::build_all(&curriculum, &intent())
}

fn content_executor(
    agent: Arc<MockAgent>,
    config: coursegen::core::PipelineConfig,
) -> ParallelContentExecutor<MockAgent> {
    ParallelContentExecutor::new(StepExecutor::new(agent, Arc::new(config)))
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let agent = Arc::new(MockAgent::new().with_lesson_delay(Duration::from_millis(20)));
    let executor = content_executor(agent.clone(), test_config());

    let batch = executor
        .generate_lessons_parallel(&contexts(10), 3, &|_, _| {})
        .await;

    assert_eq!(batch.lessons.len(), 10);
    assert_eq!(batch.fallbacks, 0);
    assert_eq!(agent.calls(AgentKind::ContentAuthor), 10);
    assert!(agent.max_concurrent_lessons() <= 3);
    assert!(agent.max_concurrent_lessons() >= 2, "lessons should overlap");
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_agent_yields_fallbacks() {
    let ids: Vec<String> = (0..5).map(|i| format!("l{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let agent = Arc::new(MockAgent::new().hang_lessons(&id_refs));
    let executor = content_executor(agent, test_config());
    let contexts = contexts(5);

    let batch = executor.generate_lessons_parallel(&contexts, 3, &|_, _| {}).await;

    assert_eq!(batch.lessons.len(), 5);
    assert_eq!(batch.fallbacks, 5);
    assert!(batch.timed_out);
    for (lesson, context) in batch.lessons.iter().zip(&contexts) {
        assert!(lesson.is_fallback);
        assert_eq!(lesson.lesson_id, context.lesson_id);
        assert_eq!(lesson.module_id, context.module_id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_timeout_keeps_finished_lessons() {
    let agent = Arc::new(MockAgent::new().hang_lessons(&["l3"]));
    // Let the batch deadline fire before the per-call timeout does
    let config = test_config().with_agent_timeout(AgentKind::ContentAuthor, Duration::from_secs(3600));
    let executor = content_executor(agent, config);

    let batch = executor.generate_lessons_parallel(&contexts(6), 3, &|_, _| {}).await;

    assert!(batch.timed_out);
    assert_eq!(batch.fallbacks, 1);
    let fallbacks: Vec<_> = batch
        .lessons
        .iter()
        .filter(|l| l.is_fallback)
        .map(|l| l.lesson_id.as_str())
        .collect();
    assert_eq!(fallbacks, vec!["l3"]);
}

#[tokio::test]
async fn test_course_completes_when_every_lesson_fails() {
    let ids: Vec<String> = curriculum().lessons().map(|(_, l)| l.id.clone()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let agent = Arc::new(MockAgent::new().fail_lessons(&id_refs));
    let (orchestrator, _store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();

    assert_course_complete(&course);
    assert_eq!(course.metadata.fallback_lessons, LESSON_COUNT);
    assert!(course.lessons.iter().all(|l| l.is_fallback));
}

#[tokio::test]
async fn test_batch_size_one_runs_sequentially() {
    let agent = Arc::new(MockAgent::new().with_lesson_delay(Duration::from_millis(5)));
    let (orchestrator, _store) = orchestrator_with(agent.clone(), test_config().with_batch_size(1));

    let course = orchestrator.generate(request()).await.unwrap();

    assert_course_complete(&course);
    assert_eq!(agent.max_concurrent_lessons(), 1);
}
