//! coursegen - A resumable course generation pipeline driven by generative agents

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod validation;

// Re-export commonly used types
pub use agent::{AgentClientConfig, AgentError, AgentExecutor, AgentKind, AgentResponse, CommandAgent};
pub use core::{CourseRequest, GeneratedCourse, JobStatus, PipelineConfig, PipelineStep};
pub use execution::{Orchestrator, PipelineError, ProgressEvent, ProgressStream};
pub use persistence::{InMemoryJobStore, JobRecord, JobStore};
#[cfg(feature = "sqlite")]
pub use persistence::SqliteJobStore;
