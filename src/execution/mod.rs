//! Pipeline execution engine

pub mod error;
pub mod events;
pub mod executor;
pub mod fallback;
pub mod orchestrator;
pub mod parallel;

pub use error::PipelineError;
pub use events::{EventSink, ProgressEvent, ProgressStream};
pub use executor::{AgentRun, StepExecutor};
pub use fallback::fallback_lesson;
pub use orchestrator::Orchestrator;
pub use parallel::{validate_lessons, LessonBatch, ParallelContentExecutor};
