//! Test: Subprocess Agent - a full run against an external generator

use crate::helpers::*;
use coursegen::agent::{AgentClientConfig, AgentOutput, AgentResponse, CommandAgent};
use coursegen::core::{LessonGenerationContext, PipelineStep};
use coursegen::execution::Orchestrator;
use coursegen::persistence::{InMemoryJobStore, JobStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Dispatch on the agent named in the request and print a canned response.
/// Lessons are filled in from a template keyed by the requested IDs.
const GENERATOR: &str = r#"
req=$(cat)
case "$req" in
  *'"agent":"intent_analyzer"'*) cat "$FIXTURES/intent.json" ;;
  *'"agent":"curriculum_designer"'*) cat "$FIXTURES/curriculum.json" ;;
  *'"agent":"assessment_designer"'*) cat "$FIXTURES/assessments.json" ;;
  *'"agent":"quality_reviewer"'*) cat "$FIXTURES/qa.json" ;;
  *'"agent":"content_author"'*)
    lesson=$(printf '%s' "$req" | grep -o '"lesson_id":"[^"]*"' | head -n 1 | cut -d'"' -f4)
    module=$(printf '%s' "$req" | grep -o '"module_id":"[^"]*"' | head -n 1 | cut -d'"' -f4)
    sed -e "s/__LESSON__/$lesson/g" -e "s/__MODULE__/$module/g" "$FIXTURES/lesson.json" ;;
  *) echo "unknown request" >&2; exit 2 ;;
esac
"#;

fn write_response(dir: &Path, name: &str, output: AgentOutput) {
    let response = AgentResponse::new(output).with_usage(10, 20);
    std::fs::write(dir.join(name), serde_json::to_vec(&response).unwrap()).unwrap();
}

fn fixtures() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();
    let curriculum = curriculum();

    write_response(path, "intent.json", AgentOutput::Intent(intent()));
    write_response(path, "curriculum.json", AgentOutput::Curriculum(curriculum.clone()));
    write_response(path, "assessments.json", AgentOutput::Assessments(assessments(&curriculum)));
    write_response(path, "qa.json", AgentOutput::QaReport(qa_report()));

    let mut template = LessonGenerationContext::build_all(&curriculum, &intent()).remove(0);
    template.lesson_id = "__LESSON__".to_string();
    template.module_id = "__MODULE__".to_string();
    write_response(path, "lesson.json", AgentOutput::Lesson(lesson_for(&template)));

    dir
}

#[tokio::test]
async fn test_full_run_through_external_generator() {
    let dir = fixtures();
    let script = format!("FIXTURES='{}'\n{}", dir.path().display(), GENERATOR);
    let agent = Arc::new(CommandAgent::new(
        AgentClientConfig::new()
            .with_command("sh")
            .with_args(["-c", script.as_str()])
            .with_timeout(30),
    ));
    let store = Arc::new(InMemoryJobStore::new());
    let orchestrator = Orchestrator::new(agent, store.clone() as Arc<dyn JobStore>, test_config());

    let course = orchestrator.generate(request()).await.unwrap();

    assert_course_complete(&course);
    assert_eq!(course.metadata.fallback_lessons, 0);
    assert_eq!(course.lessons[4].lesson_id, "m2-l2");
    assert_eq!(course.lessons[4].module_id, "m2");
    // 4 single-call steps plus one call per lesson, 30 tokens each
    assert_eq!(course.metadata.tokens_used, 30 * (4 + LESSON_COUNT as u64));

    let job = store.get_job(&course.job_id).await.unwrap();
    assert!(job.step_result(PipelineStep::Finalize).is_some());
}
