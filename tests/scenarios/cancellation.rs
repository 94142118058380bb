//! Test: Cancellation - jobs stop at the next step boundary

use crate::helpers::*;
use crate::mock_agent::MockAgent;
use coursegen::agent::AgentKind;
use coursegen::core::{JobStatus, PipelineStep};
use coursegen::execution::{PipelineError, ProgressEvent};
use coursegen::persistence::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

#[tokio::test]
async fn test_cancel_pending_job() {
    let agent = Arc::new(MockAgent::new());
    let (orchestrator, store) = orchestrator(agent.clone());
    let job = store.create_job(&request(), 3).await.unwrap();

    let status = orchestrator.cancel(&job.id).await.unwrap();
    assert_eq!(status, JobStatus::Cancelled);

    let err = orchestrator.resume(&job.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { .. }));
    assert_eq!(agent.total_calls(), 0);
}

#[tokio::test]
async fn test_cancel_running_job_stops_after_current_step() {
    let agent = Arc::new(MockAgent::new().with_lesson_delay(Duration::from_millis(50)));
    let (orchestrator, store) = orchestrator(agent.clone());

    let mut stream = orchestrator.generate_with_streaming(request()).await.unwrap();
    let mut events = Vec::new();
    let mut job_id = None;
    while let Some(event) = stream.next().await {
        if let ProgressEvent::Started { job_id: id, .. } = &event {
            job_id = Some(id.clone());
        }
        let writing = matches!(
            event,
            ProgressEvent::AgentWorking { step: PipelineStep::Content, .. }
        );
        events.push(event);
        if writing {
            break;
        }
    }
    let job_id = job_id.unwrap();

    let status = orchestrator.cancel(&job_id).await.unwrap();
    assert_eq!(status, JobStatus::Step(PipelineStep::Content));

    while let Some(event) = stream.next().await {
        events.push(event);
    }

    match events.last() {
        Some(ProgressEvent::Error { step, .. }) => assert_eq!(*step, Some(PipelineStep::Assessments)),
        other => panic!("expected Error as last event, got {:?}", other),
    }

    // The in-flight step finished and was kept; nothing after it ran
    let job = store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.step_result(PipelineStep::Content).is_some());
    assert!(job.lease_owner.is_none());
    assert_eq!(agent.calls(AgentKind::ContentAuthor), LESSON_COUNT);
    assert_eq!(agent.calls(AgentKind::AssessmentDesigner), 0);

    let err = orchestrator.resume(&job_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { .. }));
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let (orchestrator, _store) = orchestrator(Arc::new(MockAgent::new()));

    let err = orchestrator.cancel("nope").await.unwrap_err();

    assert!(matches!(err, PipelineError::JobNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn test_cancel_completed_job_is_a_no_op() {
    let (orchestrator, store) = orchestrator(Arc::new(MockAgent::new()));
    let course = orchestrator.generate(request()).await.unwrap();

    let status = orchestrator.cancel(&course.job_id).await.unwrap();

    assert_eq!(status, JobStatus::Completed);
    let job = store.get_job(&course.job_id).await.unwrap();
    assert!(!job.cancel_requested);
    assert_eq!(orchestrator.resume(&course.job_id).await.unwrap(), course);
}
