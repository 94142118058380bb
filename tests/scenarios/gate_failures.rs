//! Test: Gate Failures - strict and lenient gates with auto-fix

use crate::helpers::*;
use crate::mock_agent::{MockAgent, Reply};
use coursegen::agent::{AgentKind, AgentOutput};
use coursegen::core::{
    Curriculum, IntentResult, JobStatus, PipelineStep, QaFinding, Quiz, Severity,
};
use coursegen::execution::PipelineError;
use coursegen::persistence::{JobFilter, JobStore};
use std::sync::Arc;

/// Curriculum where the second module reuses lesson ID `L1`
fn duplicate_curriculum() -> Curriculum {
    let mut curriculum = curriculum();
    curriculum.modules[0].lessons[0].id = "L1".to_string();
    curriculum.modules[1].lessons[0].id = "L1".to_string();
    curriculum
}

fn with_curriculum(curriculum: Curriculum) -> MockAgent {
    MockAgent::new().reply(
        AgentKind::CurriculumDesigner,
        Reply::Output(AgentOutput::Curriculum(curriculum)),
    )
}

fn with_intent(intent: IntentResult) -> MockAgent {
    MockAgent::new().reply(AgentKind::IntentAnalyzer, Reply::Output(AgentOutput::Intent(intent)))
}

#[tokio::test]
async fn test_duplicate_lesson_ids_fail_strict_gate() {
    let agent = Arc::new(with_curriculum(duplicate_curriculum()));
    let (orchestrator, store) = orchestrator_with(agent.clone(), test_config().with_auto_fix(false));

    let err = orchestrator.generate(request()).await.unwrap_err();

    match &err {
        PipelineError::Gate { step, issues } => {
            assert_eq!(*step, PipelineStep::Curriculum);
            assert!(issues.iter().any(|i| i == "Duplicate lesson ID: L1"), "{:?}", issues);
        }
        other => panic!("expected gate failure, got {:?}", other),
    }
    // A gate failure is not retried and nothing downstream runs
    assert_eq!(agent.calls(AgentKind::CurriculumDesigner), 1);
    assert_eq!(agent.calls(AgentKind::ContentAuthor), 0);

    let jobs = store.list_jobs(&JobFilter::default()).await.unwrap();
    let job = &jobs[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failed_step, Some(PipelineStep::Curriculum));
    assert!(job.step_result(PipelineStep::Intent).is_some());
    assert!(job.step_result(PipelineStep::Curriculum).is_none());
}

#[tokio::test]
async fn test_duplicate_lesson_ids_are_renumbered_by_autofix() {
    let agent = Arc::new(with_curriculum(duplicate_curriculum()));
    let (orchestrator, _store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();

    let ids: Vec<_> = course.curriculum.lessons().map(|(_, l)| l.id.clone()).collect();
    assert!(ids.contains(&"L1".to_string()));
    assert!(ids.contains(&"L1-2".to_string()));
    assert_course_complete(&course);
}

#[tokio::test]
async fn test_empty_topic_cannot_be_fixed() {
    let mut bad = intent();
    bad.topic = "  ".to_string();
    let agent = Arc::new(with_intent(bad));
    let (orchestrator, _store) = orchestrator(agent);

    let err = orchestrator.generate(request()).await.unwrap_err();

    assert_eq!(err.step(), Some(PipelineStep::Intent));
    assert!(!err.issues().is_empty());
}

#[tokio::test]
async fn test_out_of_range_duration_is_clamped() {
    let mut long = intent();
    long.estimated_hours = 500;
    let agent = Arc::new(with_intent(long));
    let (orchestrator, _store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();

    assert_eq!(course.intent.estimated_hours, 100);
}

#[tokio::test]
async fn test_missing_objectives_are_padded() {
    let mut vague = intent();
    vague.learning_objectives.clear();
    let agent = Arc::new(with_intent(vague));
    let (orchestrator, _store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();

    assert_eq!(course.intent.learning_objectives.len(), 3);
}

#[tokio::test]
async fn test_dangling_quiz_dropped_by_autofix() {
    let mut with_ghost = assessments(&curriculum());
    with_ghost.quizzes.push(Quiz {
        lesson_id: "ghost".to_string(),
        questions: with_ghost.quizzes[0].questions.clone(),
    });
    let agent = Arc::new(MockAgent::new().reply(
        AgentKind::AssessmentDesigner,
        Reply::Output(AgentOutput::Assessments(with_ghost)),
    ));
    let (orchestrator, _store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();

    assert!(course.assessments.quizzes.iter().all(|q| q.lesson_id != "ghost"));
    assert_eq!(course.assessments.quizzes.len(), LESSON_COUNT);
}

#[tokio::test]
async fn test_lenient_gate_continues_without_autofix() {
    let mut with_ghost = assessments(&curriculum());
    with_ghost.quizzes.push(Quiz {
        lesson_id: "ghost".to_string(),
        questions: with_ghost.quizzes[0].questions.clone(),
    });
    let agent = Arc::new(MockAgent::new().reply(
        AgentKind::AssessmentDesigner,
        Reply::Output(AgentOutput::Assessments(with_ghost)),
    ));
    let (orchestrator, store) = orchestrator_with(agent, test_config().with_auto_fix(false));

    let course = orchestrator.generate(request()).await.unwrap();

    assert!(course.assessments.quizzes.iter().any(|q| q.lesson_id == "ghost"));
    let job = store.get_job(&course.job_id).await.unwrap();
    let gate = &job.step_result(PipelineStep::Assessments).unwrap().gate;
    assert!(!gate.passed);
}

#[tokio::test]
async fn test_lenient_gate_becomes_strict_when_configured() {
    let mut with_ghost = assessments(&curriculum());
    with_ghost.quizzes.push(Quiz {
        lesson_id: "ghost".to_string(),
        questions: with_ghost.quizzes[0].questions.clone(),
    });
    let agent = Arc::new(MockAgent::new().reply(
        AgentKind::AssessmentDesigner,
        Reply::Output(AgentOutput::Assessments(with_ghost)),
    ));
    let mut config = test_config().with_auto_fix(false);
    config.strict_late_gates = true;
    let (orchestrator, _store) = orchestrator_with(agent, config);

    let err = orchestrator.generate(request()).await.unwrap_err();

    assert_eq!(err.step(), Some(PipelineStep::Assessments));
}

#[tokio::test]
async fn test_approval_with_critical_finding_is_revoked() {
    let mut report = qa_report();
    report.issues.push(QaFinding {
        severity: Severity::Critical,
        location: "m2-l2".to_string(),
        description: "Join example gives wrong results".to_string(),
    });
    let agent = Arc::new(MockAgent::new().reply(
        AgentKind::QualityReviewer,
        Reply::Output(AgentOutput::QaReport(report)),
    ));
    let (orchestrator, _store) = orchestrator(agent);

    let course = orchestrator.generate(request()).await.unwrap();

    assert!(!course.qa_report.approved);
    assert!(course.qa_report.has_critical());
}
