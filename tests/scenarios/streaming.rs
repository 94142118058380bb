//! Test: Streaming - event order and terminal events

use crate::helpers::*;
use crate::mock_agent::MockAgent;
use coursegen::agent::AgentKind;
use coursegen::core::PipelineStep;
use coursegen::execution::ProgressEvent;
use coursegen::JobStore;
use std::sync::Arc;

fn assert_progress_monotonic(events: &[ProgressEvent]) {
    let percents: Vec<u8> = events.iter().map(ProgressEvent::progress).collect();
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {:?}",
        percents
    );
}

#[tokio::test]
async fn test_stream_reports_every_step_in_order() {
    let (orchestrator, store) = orchestrator(Arc::new(MockAgent::new()));

    let stream = orchestrator.generate_with_streaming(request()).await.unwrap();
    let events = collect_events(stream).await;

    let job_id = started_job_id(&events);
    assert!(matches!(
        events.first(),
        Some(ProgressEvent::Started { from_step: PipelineStep::Intent, .. })
    ));

    let working: Vec<PipelineStep> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::AgentWorking { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(
        working,
        vec![
            PipelineStep::Intent,
            PipelineStep::Curriculum,
            PipelineStep::Content,
            PipelineStep::Assessments,
            PipelineStep::QaReview,
        ]
    );

    let lessons: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::LessonComplete { completed, total, .. } => Some((*completed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(lessons.last(), Some(&(LESSON_COUNT, LESSON_COUNT)));
    assert!(lessons.iter().all(|(_, total)| *total == LESSON_COUNT));

    assert_progress_monotonic(&events);
    match events.last() {
        Some(ProgressEvent::Completed { job_id: done, progress, course }) => {
            assert_eq!(done, &job_id);
            assert_eq!(*progress, 100);
            assert_course_complete(course);
        }
        other => panic!("expected Completed as last event, got {:?}", other),
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let job = store.get_job(&job_id).await.unwrap();
    assert_eq!(job.progress, 100);
}

#[tokio::test]
async fn test_stream_ends_with_error_on_failure() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::IntentAnalyzer, 4));
    let (orchestrator, _store) = orchestrator(agent);

    let stream = orchestrator.generate_with_streaming(request()).await.unwrap();
    let events = collect_events(stream).await;

    assert!(matches!(events.first(), Some(ProgressEvent::Started { .. })));
    match events.last() {
        Some(ProgressEvent::Error { step, message, .. }) => {
            assert_eq!(*step, Some(PipelineStep::Intent));
            assert!(message.contains("simulated failure"), "{}", message);
        }
        other => panic!("expected Error as last event, got {:?}", other),
    }
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::Completed { .. })));
}

#[tokio::test]
async fn test_gate_failure_event_lists_issues() {
    let mut bad = intent();
    bad.topic = String::new();
    let agent = Arc::new(MockAgent::new().reply(
        AgentKind::IntentAnalyzer,
        crate::mock_agent::Reply::Output(coursegen::agent::AgentOutput::Intent(bad)),
    ));
    let (orchestrator, _store) = orchestrator(agent);

    let events = collect_events(orchestrator.generate_with_streaming(request()).await.unwrap()).await;

    match events.last() {
        Some(ProgressEvent::Error { issues, .. }) => assert!(!issues.is_empty()),
        other => panic!("expected Error as last event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resumed_stream_starts_at_resume_point() {
    let agent = Arc::new(MockAgent::new().fail_times(AgentKind::QualityReviewer, 4));
    let (orchestrator, _store) = orchestrator(agent.clone());
    let failed = collect_events(orchestrator.generate_with_streaming(request()).await.unwrap()).await;
    let job_id = started_job_id(&failed);

    let events = collect_events(orchestrator.resume_with_streaming(&job_id).await.unwrap()).await;

    match events.first() {
        Some(ProgressEvent::Started { job_id: id, from_step, progress }) => {
            assert_eq!(id, &job_id);
            assert_eq!(*from_step, PipelineStep::QaReview);
            assert!(*progress > 0);
        }
        other => panic!("expected Started as first event, got {:?}", other),
    }
    let working: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::AgentWorking { agent, .. } => Some(*agent),
            _ => None,
        })
        .collect();
    assert_eq!(working, vec![AgentKind::QualityReviewer]);
    assert_progress_monotonic(&events);
    assert!(matches!(events.last(), Some(ProgressEvent::Completed { .. })));
}

#[tokio::test]
async fn test_streaming_unknown_job_is_an_error() {
    let (orchestrator, _store) = orchestrator(Arc::new(MockAgent::new()));

    let result = orchestrator.resume_with_streaming("missing").await;

    assert!(result.is_err());
}
