//! Fixtures and assertions shared by the scenario tests

use crate::mock_agent::MockAgent;
use coursegen::core::{
    Assessments, ComponentScores, ContentBlock, CourseRequest, Curriculum, Difficulty, Exercise,
    GeneratedCourse, IntentResult, LessonContent, LessonGenerationContext, LessonOutline, Module,
    ModuleAssessment, PipelineConfig, QaReport, Question, Quiz,
};
use coursegen::execution::{Orchestrator, ProgressEvent, ProgressStream};
use coursegen::persistence::{InMemoryJobStore, JobStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

pub fn request() -> CourseRequest {
    CourseRequest::new("user-1", "Teach me data analysis in Python with pandas")
}

pub fn intent() -> IntentResult {
    IntentResult {
        topic: "Python data analysis with pandas".to_string(),
        subject_area: "data science".to_string(),
        difficulty: Difficulty::Intermediate,
        estimated_hours: 4,
        learning_objectives: vec![
            "Use pandas to load and inspect tabular data".to_string(),
            "Apply grouping and aggregation to answer questions".to_string(),
            "Create charts that summarize a dataset".to_string(),
        ],
        prerequisites: vec!["Basic Python".to_string()],
        target_audience: "analysts moving from spreadsheets".to_string(),
    }
}

fn outline(id: &str, title: &str, prerequisites: &[&str]) -> LessonOutline {
    LessonOutline {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("Hands-on lesson about {}", title.to_lowercase()),
        duration_minutes: 40,
        learning_outcomes: vec![format!("Use {} on a real dataset", title.to_lowercase())],
        prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
    }
}

/// Two modules of three lessons (6 x 40 minutes)
pub fn curriculum() -> Curriculum {
    Curriculum {
        title: "Data Analysis with pandas".to_string(),
        description: "From CSV files to insight".to_string(),
        modules: vec![
            Module {
                id: "m1".to_string(),
                title: "Getting started".to_string(),
                description: String::new(),
                lessons: vec![
                    outline("m1-l1", "DataFrames", &[]),
                    outline("m1-l2", "Selecting data", &["m1-l1"]),
                    outline("m1-l3", "Cleaning data", &["m1-l2"]),
                ],
            },
            Module {
                id: "m2".to_string(),
                title: "Answering questions".to_string(),
                description: String::new(),
                lessons: vec![
                    outline("m2-l1", "Grouping", &["m1-l3"]),
                    outline("m2-l2", "Joining tables", &["m2-l1"]),
                    outline("m2-l3", "Plotting", &["m2-l2"]),
                ],
            },
        ],
    }
}

pub const LESSON_COUNT: usize = 6;

/// A lesson that passes the content gate without warnings about length
pub fn lesson_for(context: &LessonGenerationContext) -> LessonContent {
    let sentence = format!(
        "In this lesson on {} we work through a realistic dataset step by step and explain each decision. ",
        context.lesson_title
    );
    LessonContent {
        lesson_id: context.lesson_id.clone(),
        module_id: context.module_id.clone(),
        title: context.lesson_title.clone(),
        blocks: vec![
            ContentBlock::Text {
                body: sentence.repeat(10),
            },
            ContentBlock::Code {
                language: "python".to_string(),
                source: "import pandas as pd\n\ndf = pd.read_csv(\"sales.csv\")\nprint(df.head())\n"
                    .to_string(),
                explanation: Some("Load the file and look at the first rows.".to_string()),
            },
            ContentBlock::KeyPoints {
                points: context.learning_outcomes.clone(),
            },
        ],
        exercises: vec![Exercise {
            prompt: "Load the orders file and print its shape".to_string(),
            solution: "df = pd.read_csv(\"orders.csv\")\nprint(df.shape)".to_string(),
            hints: vec![],
        }],
        summary: format!("You practiced {}.", context.lesson_title),
        is_fallback: false,
    }
}

fn question(n: usize) -> Question {
    Question::MultipleChoice {
        prompt: format!("Question {}", n),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_index: n % 4,
        explanation: String::new(),
    }
}

/// One quiz per lesson plus one assessment per module
pub fn assessments(curriculum: &Curriculum) -> Assessments {
    let mut n = 0;
    let mut next = || {
        n += 1;
        question(n)
    };
    Assessments {
        quizzes: curriculum
            .lessons()
            .map(|(_, lesson)| Quiz {
                lesson_id: lesson.id.clone(),
                questions: vec![next(), next(), next()],
            })
            .collect(),
        module_assessments: curriculum
            .modules
            .iter()
            .map(|module| ModuleAssessment {
                module_id: module.id.clone(),
                title: format!("{} check", module.title),
                questions: vec![next(), next()],
            })
            .collect(),
    }
}

pub fn qa_report() -> QaReport {
    QaReport {
        overall_score: 8.5,
        approved: true,
        component_scores: ComponentScores {
            content_quality: 8.5,
            pedagogy: 8.0,
            accuracy: 9.0,
            engagement: 8.5,
        },
        issues: vec![],
        summary: "Solid course".to_string(),
    }
}

/// Default config with millisecond backoff so retries don't slow tests
pub fn test_config() -> PipelineConfig {
    PipelineConfig::default().with_backoff_base(Duration::from_millis(1))
}

pub fn orchestrator(agent: Arc<MockAgent>) -> (Orchestrator<MockAgent>, Arc<InMemoryJobStore>) {
    orchestrator_with(agent, test_config())
}

pub fn orchestrator_with(
    agent: Arc<MockAgent>,
    config: PipelineConfig,
) -> (Orchestrator<MockAgent>, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let orchestrator = Orchestrator::new(agent, store.clone() as Arc<dyn JobStore>, config);
    (orchestrator, store)
}

/// Drain a progress stream to its end
pub async fn collect_events(stream: ProgressStream) -> Vec<ProgressEvent> {
    stream.collect().await
}

/// Job ID announced by the `Started` event
pub fn started_job_id(events: &[ProgressEvent]) -> String {
    match events.first() {
        Some(ProgressEvent::Started { job_id, .. }) => job_id.clone(),
        other => panic!("expected Started as first event, got {:?}", other),
    }
}

/// The five generated artifacts, ignoring run metadata
pub fn artifacts(
    course: &GeneratedCourse,
) -> (&IntentResult, &Curriculum, &[LessonContent], &Assessments, &QaReport) {
    (
        &course.intent,
        &course.curriculum,
        &course.lessons,
        &course.assessments,
        &course.qa_report,
    )
}

pub fn assert_course_complete(course: &GeneratedCourse) {
    assert_eq!(course.lessons.len(), course.curriculum.lesson_count());
    let ids: Vec<_> = course.lessons.iter().map(|l| l.lesson_id.as_str()).collect();
    let expected: Vec<_> = course.curriculum.lessons().map(|(_, l)| l.id.as_str()).collect();
    assert_eq!(ids, expected, "lessons must follow curriculum order");
}
