//! Scenario-based tests for the generation pipeline

mod helpers;

mod cancellation;
mod fan_out;
mod gate_failures;
mod resume_equivalence;
mod retry_behavior;
mod streaming;
#[cfg(unix)]
mod subprocess_agent;
mod success_chain;
