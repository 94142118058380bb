//! Test: Retry Behavior - per-step retries and the retry budget

use crate::helpers::*;
use crate::mock_agent::MockAgent;
use coursegen::agent::{AgentError, AgentKind};
use coursegen::core::{JobStatus, PipelineStep};
use coursegen::execution::PipelineError;
use coursegen::persistence::{JobFilter, JobStore};
use std::sync::Arc;

/// Transient agent failures are absorbed by the step's retries
#[tokio::test]
async fn test_transient_failures_are_retried() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::CurriculumDesigner, 2));
    let (orchestrator, store) = orchestrator(agent.clone());

    let course = orchestrator.generate(request()).await.unwrap();

    assert_eq!(agent.calls(AgentKind::CurriculumDesigner), 3);
    let job = store.get_job(&course.job_id).await.unwrap();
    assert_eq!(job.step_result(PipelineStep::Curriculum).unwrap().attempts, 3);
    assert_eq!(job.retry_count, 0, "step retries do not count against the job");
}

/// Exhausting the step retries fails the job at that step
#[tokio::test]
async fn test_exhausted_step_retries_fail_job() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::IntentAnalyzer, 10));
    let (orchestrator, store) = orchestrator_with(agent.clone(), test_config().with_max_retries(3));

    let err = orchestrator.generate(request()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Agent {
            step: PipelineStep::Intent,
            attempts: 4,
            source: AgentError::Api(_)
        }
    ));
    assert_eq!(agent.calls(AgentKind::IntentAnalyzer), 4);
    assert_eq!(agent.calls(AgentKind::CurriculumDesigner), 0);

    let jobs = store.list_jobs(&JobFilter::default()).await.unwrap();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failed_step, Some(PipelineStep::Intent));
    assert_eq!(job.retry_count, 1);
    assert!(job.error_message.as_deref().unwrap().contains("simulated failure"));
    assert!(job.lease_owner.is_none());
}

/// Zero retries means a single attempt
#[tokio::test]
async fn test_zero_retries_single_attempt() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::QualityReviewer, 1));
    let (orchestrator, _store) = orchestrator_with(agent.clone(), test_config().with_max_retries(0));

    let err = orchestrator.generate(request()).await.unwrap_err();

    assert_eq!(err.step(), Some(PipelineStep::QaReview));
    assert_eq!(agent.calls(AgentKind::QualityReviewer), 1);
}

/// A lesson that fails is replaced, never retried
#[tokio::test]
async fn test_failed_lesson_is_not_retried() {
    let agent = Arc::new(MockAgent::new().fail_lessons(&["m1-l2"]));
    let (orchestrator, _store) = orchestrator(agent.clone());

    let course = orchestrator.generate(request()).await.unwrap();

    assert_eq!(agent.calls(AgentKind::ContentAuthor), LESSON_COUNT);
    assert_course_complete(&course);
    assert_eq!(course.metadata.fallback_lessons, 1);
    let fallback = course.lessons.iter().find(|l| l.lesson_id == "m1-l2").unwrap();
    assert!(fallback.is_fallback);
    assert_eq!(fallback.module_id, "m1");
}
