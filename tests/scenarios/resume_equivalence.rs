//! Test: Resume - a resumed job finishes as if it had never stopped

use crate::helpers::*;
use crate::mock_agent::MockAgent;
use coursegen::agent::AgentKind;
use coursegen::core::{JobStatus, PipelineStep};
use coursegen::execution::PipelineError;
use coursegen::persistence::{JobFilter, JobStore, ResumePoint};
use std::sync::Arc;

async fn only_job_id(store: &dyn JobStore) -> String {
    let jobs = store.list_jobs(&JobFilter::default()).await.unwrap();
    assert_eq!(jobs.len(), 1);
    jobs[0].id.clone()
}

#[tokio::test]
async fn test_resume_after_failure_matches_uninterrupted_run() {
    let (reference, _) = orchestrator(Arc::new(MockAgent::new()));
    let uninterrupted = reference.generate(request()).await.unwrap();

    // Fail QA review on every attempt, leaving steps 1-4 stored
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::QualityReviewer, 4));
    let (orchestrator, store) = orchestrator(agent.clone());
    let err = orchestrator.generate(request()).await.unwrap_err();
    assert_eq!(err.step(), Some(PipelineStep::QaReview));

    let job_id = only_job_id(store.as_ref()).await;
    let job = store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.resume_point(), ResumePoint::Step(PipelineStep::QaReview));

    let resumed = orchestrator.resume(&job_id).await.unwrap();

    assert_eq!(artifacts(&resumed), artifacts(&uninterrupted));
    assert_eq!(resumed.job_id, job_id);

    // Completed steps were loaded, not regenerated
    assert_eq!(agent.calls(AgentKind::IntentAnalyzer), 1);
    assert_eq!(agent.calls(AgentKind::CurriculumDesigner), 1);
    assert_eq!(agent.calls(AgentKind::ContentAuthor), LESSON_COUNT);
    assert_eq!(agent.calls(AgentKind::AssessmentDesigner), 1);
    assert_eq!(agent.calls(AgentKind::QualityReviewer), 5);

    let job = store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.retry_count, 1);
    assert!(job.error_message.is_none());
}

#[tokio::test]
async fn test_resume_after_every_step_matches_uninterrupted_run() {
    let (reference, reference_store) = orchestrator(Arc::new(MockAgent::new()));
    let uninterrupted = reference.generate(request()).await.unwrap();
    let finished = reference_store.get_job(&uninterrupted.job_id).await.unwrap();

    for stored in 1..PipelineStep::ALL.len() {
        let agent = Arc::new(MockAgent::new());
        let (orchestrator, store) = orchestrator(agent.clone());
        let job = store.create_job(&request(), 3).await.unwrap();
        for step in &PipelineStep::ALL[..stored] {
            let result = finished.step_result(*step).unwrap().clone();
            store.save_step_result(&job.id, *step, result).await.unwrap();
        }

        let resumed = orchestrator.resume(&job.id).await.unwrap();

        assert_eq!(
            artifacts(&resumed),
            artifacts(&uninterrupted),
            "resumed after {} stored step(s)",
            stored
        );
        for step in PipelineStep::ALL {
            let Some(kind) = AgentKind::for_step(step) else {
                continue;
            };
            let expected = match (step.index() < stored, kind) {
                (true, _) => 0,
                (false, AgentKind::ContentAuthor) => LESSON_COUNT,
                (false, _) => 1,
            };
            assert_eq!(agent.calls(kind), expected, "{} after {} stored step(s)", kind, stored);
        }
    }
}

#[tokio::test]
async fn test_resume_completed_job_returns_stored_course() {
    let agent = Arc::new(MockAgent::new());
    let (orchestrator, _store) = orchestrator(agent.clone());
    let course = orchestrator.generate(request()).await.unwrap();
    let calls = agent.total_calls();

    let again = orchestrator.resume(&course.job_id).await.unwrap();

    assert_eq!(again, course);
    assert_eq!(agent.total_calls(), calls, "no agent work for a finished job");
}

#[tokio::test]
async fn test_generate_with_resume_uses_existing_job() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::AssessmentDesigner, 4));
    let (orchestrator, store) = orchestrator(agent.clone());
    orchestrator.generate(request()).await.unwrap_err();
    let job_id = only_job_id(store.as_ref()).await;

    let course = orchestrator
        .generate_with_resume(request(), Some(&job_id))
        .await
        .unwrap();

    assert_eq!(course.job_id, job_id);
    assert_eq!(store.list_jobs(&JobFilter::default()).await.unwrap().len(), 1);
    assert_eq!(agent.calls(AgentKind::ContentAuthor), LESSON_COUNT);
}

#[tokio::test]
async fn test_resume_refused_when_retry_budget_used() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::IntentAnalyzer, 4));
    let mut config = test_config();
    config.job_max_retries = 1;
    let (orchestrator, store) = orchestrator_with(agent.clone(), config);
    orchestrator.generate(request()).await.unwrap_err();
    let job_id = only_job_id(store.as_ref()).await;

    let err = orchestrator.resume(&job_id).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::RetryBudgetExhausted { max_retries: 1, .. }
    ));
    assert_eq!(agent.calls(AgentKind::IntentAnalyzer), 4);
    let job = store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 1);
}

#[tokio::test]
async fn test_resume_unknown_job() {
    let (orchestrator, _store) = orchestrator(Arc::new(MockAgent::new()));

    let err = orchestrator.resume("no-such-job").await.unwrap_err();

    assert!(matches!(err, PipelineError::JobNotFound(id) if id == "no-such-job"));
}

#[tokio::test]
async fn test_resume_reruns_steps_without_payloads() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::QualityReviewer, 4));
    let mut config = test_config();
    config.save_intermediate_results = false;
    let (orchestrator, store) = orchestrator_with(agent.clone(), config);
    orchestrator.generate(request()).await.unwrap_err();
    let job_id = only_job_id(store.as_ref()).await;

    orchestrator.resume(&job_id).await.unwrap();

    // Nothing was kept, so the resumed run starts over
    assert_eq!(agent.calls(AgentKind::IntentAnalyzer), 2);
    assert_eq!(agent.calls(AgentKind::ContentAuthor), 2 * LESSON_COUNT);
}
