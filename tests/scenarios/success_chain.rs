//! Test: Success Chain - all six steps run in order

use crate::helpers::*;
use crate::mock_agent::{MockAgent, Reply};
use coursegen::agent::{AgentKind, AgentOutput};
use coursegen::core::{JobStatus, PipelineStep, QaReport};
use coursegen::persistence::JobStore;
use std::sync::Arc;

#[tokio::test]
async fn test_generates_complete_course() {
    let agent = Arc::new(MockAgent::new());
    let (orchestrator, _store) = orchestrator(agent.clone());

    let course = orchestrator.generate(request()).await.unwrap();

    assert_course_complete(&course);
    assert_eq!(course.intent, intent());
    assert_eq!(course.curriculum, curriculum());
    assert_eq!(course.assessments, assessments(&curriculum()));
    assert_eq!(course.qa_report, qa_report());
    assert_eq!(course.metadata.fallback_lessons, 0);
    assert!(!course.metadata.qa_flagged);

    // 4 single-call steps at 200 tokens plus 6 lessons at 500
    assert_eq!(course.metadata.tokens_used, 4 * 200 + LESSON_COUNT as u64 * 500);

    // Each agent ran exactly as often as the pipeline needs
    assert_eq!(agent.calls(AgentKind::IntentAnalyzer), 1);
    assert_eq!(agent.calls(AgentKind::CurriculumDesigner), 1);
    assert_eq!(agent.calls(AgentKind::ContentAuthor), LESSON_COUNT);
    assert_eq!(agent.calls(AgentKind::AssessmentDesigner), 1);
    assert_eq!(agent.calls(AgentKind::QualityReviewer), 1);
}

#[tokio::test]
async fn test_job_record_reflects_completed_run() {
    let agent = Arc::new(MockAgent::new());
    let (orchestrator, store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();
    let job = store.get_job(&course.job_id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.completed_at.is_some());
    assert!(job.lease_owner.is_none(), "lease must be released");
    assert_eq!(job.step_results.len(), PipelineStep::ALL.len());
    assert_eq!(job.tokens_used, course.metadata.tokens_used);
    for step in PipelineStep::ALL {
        let stored = job.step_result(step).unwrap();
        assert!(stored.payload.is_some(), "step {} has no payload", step);
        assert_eq!(stored.attempts, 1);
    }
}

#[tokio::test]
async fn test_low_qa_score_is_flagged_not_failed() {
    let low = QaReport {
        overall_score: 5.5,
        approved: false,
        component_scores: coursegen::core::ComponentScores {
            content_quality: 5.5,
            pedagogy: 5.0,
            accuracy: 6.0,
            engagement: 5.5,
        },
        issues: vec![],
        summary: "Needs work".to_string(),
    };
    let agent = Arc::new(
        MockAgent::new().reply(AgentKind::QualityReviewer, Reply::Output(AgentOutput::QaReport(low))),
    );
    let (orchestrator, _store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();

    assert!(course.metadata.qa_flagged);
    assert_eq!(course.qa_report.overall_score, 5.5);
    assert!(!course.qa_report.approved);
}

#[tokio::test]
async fn test_summaries_only_when_intermediate_results_disabled() {
    let agent = Arc::new(MockAgent::new());
    let mut config = test_config();
    config.save_intermediate_results = false;
    let (orchestrator, store) = orchestrator_with(agent, config);

    let course = orchestrator.generate(request()).await.unwrap();
    let job = store.get_job(&course.job_id).await.unwrap();

    for step in &PipelineStep::ALL[..5] {
        let stored = job.step_result(*step).unwrap();
        assert!(stored.payload.is_none(), "step {} kept its payload", step);
        assert!(stored.tokens_used > 0);
    }
    assert!(job.step_result(PipelineStep::Finalize).unwrap().payload.is_some());
}
