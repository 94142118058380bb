//! Core domain models for course generation
//!
//! This module defines the course records produced by each step, the
//! step model itself, and the per-job execution state.

pub mod config;
pub mod context;
pub mod course;
pub mod state;
pub mod step;

pub use config::{AgentSettings, PipelineConfig};
pub use context::LessonGenerationContext;
pub use course::*;
pub use state::*;
pub use step::*;
