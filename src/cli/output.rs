//! CLI output formatting

use crate::core::course::GeneratedCourse;
use crate::core::state::JobStatus;
use crate::core::step::PipelineStep;
use crate::execution::ProgressEvent;
use crate::persistence::JobRecord;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static BOOK: Emoji<'_, '_> = Emoji("📘 ", "# ");

/// Create a percent progress bar for a generation run
pub fn create_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Short human label for a step
pub fn step_label(step: PipelineStep) -> &'static str {
    match step {
        PipelineStep::Intent => "Intent analysis",
        PipelineStep::Curriculum => "Curriculum design",
        PipelineStep::Content => "Lesson content",
        PipelineStep::Assessments => "Assessments",
        PipelineStep::QaReview => "Quality review",
        PipelineStep::Finalize => "Finalize",
    }
}

/// Format a job status for display
pub fn format_status(status: JobStatus) -> String {
    match status {
        JobStatus::Pending => style("PENDING").dim().to_string(),
        JobStatus::Running => style("RUNNING").yellow().to_string(),
        JobStatus::Step(step) => style(format!("STEP {}/6 {}", step.number(), step))
            .yellow()
            .to_string(),
        JobStatus::Completed => style("COMPLETED").green().to_string(),
        JobStatus::Failed => style("FAILED").red().to_string(),
        JobStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// One-line summary of a job for history listings
pub fn format_job_summary(job: &JobRecord) -> String {
    let status_icon = match job.status {
        JobStatus::Completed => CHECK,
        JobStatus::Failed => CROSS,
        JobStatus::Running | JobStatus::Step(_) => SPINNER,
        _ => INFO,
    };

    format!(
        "{} {} - {} - {} - {} - {}",
        status_icon,
        style(short_id(&job.id)).dim(),
        style(truncate(&job.prompt, 48)).bold(),
        format_status(job.status),
        style(format!("{}%", job.progress)).cyan(),
        style(job.created_at.format("%Y-%m-%d %H:%M")).dim()
    )
}

/// Format a progress event for streaming output
pub fn format_progress_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Started {
            job_id,
            from_step,
            progress,
        } => {
            if *from_step == PipelineStep::Intent {
                format!("{} Starting job {}", ROCKET, style(short_id(job_id)).dim())
            } else {
                format!(
                    "{} Resuming job {} at {} ({}%)",
                    ROCKET,
                    style(short_id(job_id)).dim(),
                    style(step_label(*from_step)).cyan(),
                    progress
                )
            }
        }
        ProgressEvent::AgentWorking {
            step,
            agent,
            progress,
            message,
        } => format!(
            "{} [{:>3}%] {}: {} ({})",
            SPINNER,
            progress,
            style(step_label(*step)).cyan(),
            message,
            style(agent).dim()
        ),
        ProgressEvent::Progress {
            progress, message, ..
        } => format!("{} [{:>3}%] {}", CHECK, progress, style(message).green()),
        ProgressEvent::LessonComplete {
            completed,
            total,
            progress,
        } => format!(
            "{} [{:>3}%] Lessons {}/{}",
            INFO,
            progress,
            style(completed).cyan(),
            total
        ),
        ProgressEvent::Completed { course, .. } => format!(
            "{} Course {} ready ({} lessons)",
            CHECK,
            style(&course.curriculum.title).bold(),
            course.lessons.len()
        ),
        ProgressEvent::Error {
            step,
            message,
            issues,
            ..
        } => {
            let mut line = match step {
                Some(step) => format!("{} {}: {}", CROSS, style(step_label(*step)).red(), message),
                None => format!("{} {}", CROSS, style(message).red()),
            };
            for issue in issues {
                line.push_str(&format!("\n    - {}", style(issue).dim()));
            }
            line
        }
    }
}

/// Print an overview of a finished course
pub fn print_course_summary(course: &GeneratedCourse) {
    println!("\n{} {}", BOOK, style(&course.curriculum.title).bold());
    println!(
        "  Topic: {} ({}, ~{}h)",
        style(&course.intent.topic).cyan(),
        course.intent.difficulty,
        course.intent.estimated_hours
    );
    for module in &course.curriculum.modules {
        println!("  {} ({} lessons)", style(&module.title).bold(), module.lessons.len());
    }

    let qa = &course.qa_report;
    let score = format!("{:.1}/10", qa.overall_score);
    let score = if course.metadata.qa_flagged {
        style(score).yellow()
    } else {
        style(score).green()
    };
    println!("  QA score: {}", score);
    println!(
        "  Tokens: {}  Duration: {}",
        style(course.metadata.tokens_used).cyan(),
        format_duration(Duration::from_secs_f64(course.metadata.total_duration_secs.max(0.0)))
    );
    if course.metadata.fallback_lessons > 0 {
        println!(
            "  {} {} lesson(s) use placeholder content",
            WARN, course.metadata.fallback_lessons
        );
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
