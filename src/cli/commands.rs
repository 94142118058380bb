//! CLI command definitions

use crate::core::course::{CoursePreferences, CourseRequest, Difficulty};
use crate::core::state::JobStatus;
use crate::persistence::JobFilter;
use clap::Args;

/// Generate a new course
#[derive(Debug, Args, Clone)]
pub struct GenerateCommand {
    /// What the course should teach
    pub prompt: String,

    /// User the job belongs to
    #[arg(short, long, default_value = "local")]
    pub user: String,

    /// Target difficulty
    #[arg(long, value_enum)]
    pub difficulty: Option<DifficultyArg>,

    /// Desired course length in hours
    #[arg(long)]
    pub hours: Option<u32>,

    /// Language of the generated material
    #[arg(long)]
    pub language: Option<String>,

    /// Preferred learning style (e.g. "hands-on")
    #[arg(long)]
    pub learning_style: Option<String>,

    /// Write the finished course as JSON to this file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Don't save the job to the database
    #[arg(long)]
    pub no_history: bool,
}

impl GenerateCommand {
    pub fn to_request(&self) -> CourseRequest {
        CourseRequest::new(&self.user, &self.prompt).with_preferences(CoursePreferences {
            difficulty: self.difficulty.map(Difficulty::from),
            duration_hours: self.hours,
            language: self.language.clone(),
            learning_style: self.learning_style.clone(),
        })
    }
}

/// Resume an interrupted or failed job
#[derive(Debug, Args, Clone)]
pub struct ResumeCommand {
    /// Job ID
    pub job_id: String,

    /// Write the finished course as JSON to this file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Show the state of a job
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    /// Job ID
    pub job_id: String,

    /// Show per-step details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List recent jobs
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Only jobs with this status (e.g. failed, completed, step3_content)
    #[arg(long)]
    pub status: Option<String>,

    /// Only jobs for this user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Number of recent jobs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub fn to_filter(&self) -> Result<JobFilter, String> {
        let status = self
            .status
            .as_deref()
            .map(|s| s.parse::<JobStatus>())
            .transpose()?;
        Ok(JobFilter {
            status,
            user_id: self.user.clone(),
            limit: self.limit,
        })
    }
}

/// Cancel a job
#[derive(Debug, Args, Clone)]
pub struct CancelCommand {
    /// Job ID
    pub job_id: String,
}

/// Fail jobs stuck in a running state
#[derive(Debug, Args, Clone)]
pub struct CleanupCommand {
    /// Jobs running longer than this many hours are marked failed
    #[arg(long = "hours", visible_alias = "older-than-hours", default_value_t = 2)]
    pub older_than_hours: u64,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateConfigCommand {
    /// Path to configuration YAML file
    pub file: String,

    /// Output the effective configuration as JSON
    #[arg(long)]
    pub json: bool,
}

/// Difficulty argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DifficultyArg {
    Beginner,
    Intermediate,
    Advanced,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Beginner => Difficulty::Beginner,
            DifficultyArg::Intermediate => Difficulty::Intermediate,
            DifficultyArg::Advanced => Difficulty::Advanced,
        }
    }
}
