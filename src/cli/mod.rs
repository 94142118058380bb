//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    CancelCommand, CleanupCommand, GenerateCommand, HistoryCommand, ResumeCommand, StatusCommand,
    ValidateConfigCommand,
};
use std::ffi::OsString;

/// Course generation pipeline driven by generative agents
#[derive(Debug, Parser, Clone)]
#[command(name = "coursegen")]
#[command(author = "Coursegen Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Generate complete courses through a resumable agent pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to pipeline configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to the job database (defaults to the user data directory)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Print every progress event instead of a progress bar
    #[arg(short, long, global = true)]
    pub stream: bool,

    /// Agent executable to run for each generation request
    #[arg(long, global = true)]
    pub agent_command: Option<String>,

    /// Extra argument passed to the agent executable (repeatable)
    #[arg(long = "agent-arg", global = true)]
    pub agent_args: Vec<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Generate a new course
    Generate(GenerateCommand),

    /// Resume an interrupted or failed job
    Resume(ResumeCommand),

    /// Show the state of a job
    Status(StatusCommand),

    /// List recent jobs
    History(HistoryCommand),

    /// Cancel a job at its next step boundary
    Cancel(CancelCommand),

    /// Fail jobs that have been running for too long
    Cleanup(CleanupCommand),

    /// Validate a pipeline configuration file
    ValidateConfig(ValidateConfigCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
