use anyhow::{Context, Result};
use coursegen::agent::{AgentClientConfig, CommandAgent};
use coursegen::cli::commands::{
    CancelCommand, CleanupCommand, GenerateCommand, HistoryCommand, ResumeCommand, StatusCommand,
    ValidateConfigCommand,
};
use coursegen::cli::output::*;
use coursegen::cli::{Cli, Command};
use coursegen::core::{GeneratedCourse, PipelineConfig};
use coursegen::execution::{Orchestrator, ProgressEvent, ProgressStream};
use coursegen::persistence::{InMemoryJobStore, JobRecord, JobStore};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    // Execute command
    match &cli.command {
        Command::Generate(cmd) => generate(cmd, &cli).await?,
        Command::Resume(cmd) => resume(cmd, &cli).await?,
        Command::Status(cmd) => show_status(cmd, &cli).await?,
        Command::History(cmd) => show_history(cmd, &cli).await?,
        Command::Cancel(cmd) => cancel(cmd, &cli).await?,
        Command::Cleanup(cmd) => cleanup(cmd, &cli).await?,
        Command::ValidateConfig(cmd) => validate_config(cmd)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load pipeline config from {}", path)),
        None => Ok(PipelineConfig::default()),
    }
}

#[cfg(feature = "sqlite")]
async fn open_store(cli: &Cli, ephemeral: bool) -> Result<Arc<dyn JobStore>> {
    use coursegen::persistence::SqliteJobStore;

    if ephemeral {
        return Ok(Arc::new(InMemoryJobStore::new()));
    }
    let store = match &cli.db {
        Some(path) => SqliteJobStore::open(std::path::Path::new(path)).await,
        None => SqliteJobStore::with_default_path().await,
    }
    .context("Failed to open job database")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store(_cli: &Cli, _ephemeral: bool) -> Result<Arc<dyn JobStore>> {
    println!("{} Built without sqlite support; jobs are not persisted", WARN);
    Ok(Arc::new(InMemoryJobStore::new()))
}

fn build_agent(cli: &Cli) -> Arc<CommandAgent> {
    let mut config = AgentClientConfig::new().with_args(cli.agent_args.clone());
    if let Some(command) = &cli.agent_command {
        config = config.with_command(command.clone());
    }
    Arc::new(CommandAgent::new(config))
}

async fn build_orchestrator(cli: &Cli, ephemeral: bool) -> Result<Orchestrator<CommandAgent>> {
    let config = load_config(cli)?;
    let store = open_store(cli, ephemeral).await?;
    Ok(Orchestrator::new(build_agent(cli), store, config))
}

async fn generate(cmd: &GenerateCommand, cli: &Cli) -> Result<()> {
    let orchestrator = build_orchestrator(cli, cmd.no_history).await?;
    println!(
        "{} Generating course: {}",
        INFO,
        style(&cmd.prompt).bold()
    );

    let stream = orchestrator.generate_with_streaming(cmd.to_request()).await?;
    let course = follow(stream, cli.stream).await;
    finish(course, cmd.output.as_deref())
}

async fn resume(cmd: &ResumeCommand, cli: &Cli) -> Result<()> {
    let orchestrator = build_orchestrator(cli, false).await?;
    let stream = orchestrator.resume_with_streaming(&cmd.job_id).await?;
    let course = follow(stream, cli.stream).await;
    finish(course, cmd.output.as_deref())
}

/// Consume progress events until the run ends; returns the course on success
async fn follow(mut stream: ProgressStream, verbose: bool) -> Option<GeneratedCourse> {
    let bar = (!verbose).then(create_progress_bar);
    let mut job_id = None;
    let mut course = None;

    while let Some(event) = stream.next().await {
        if let ProgressEvent::Started { job_id: id, .. } = &event {
            job_id = Some(id.clone());
        }

        match &bar {
            Some(bar) => {
                bar.set_position(u64::from(event.progress()));
                match &event {
                    ProgressEvent::AgentWorking { message, .. }
                    | ProgressEvent::Progress { message, .. } => bar.set_message(message.clone()),
                    ProgressEvent::LessonComplete { completed, total, .. } => {
                        bar.set_message(format!("Lessons {}/{}", completed, total))
                    }
                    ProgressEvent::Completed { .. } | ProgressEvent::Error { .. } => {
                        bar.finish_and_clear();
                        println!("{}", format_progress_event(&event));
                    }
                    ProgressEvent::Started { .. } => {}
                }
            }
            None => println!("{}", format_progress_event(&event)),
        }

        if let ProgressEvent::Completed { course: done, .. } = event {
            course = Some(*done);
        }
    }

    if let Some(id) = job_id {
        println!("{} Job ID: {}", INFO, style(id).dim());
    }
    course
}

fn finish(course: Option<GeneratedCourse>, output: Option<&str>) -> Result<()> {
    let Some(course) = course else {
        error!("Generation did not complete");
        std::process::exit(1);
    };

    print_course_summary(&course);
    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&course)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
        println!("{} Course written to {}", CHECK, style(path).cyan());
    }
    Ok(())
}

async fn show_status(cmd: &StatusCommand, cli: &Cli) -> Result<()> {
    let store = open_store(cli, false).await?;
    let job = store
        .get_job(&cmd.job_id)
        .await
        .with_context(|| format!("Could not load job {}", cmd.job_id))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }
    print_job_details(&job, cmd.verbose);
    Ok(())
}

fn print_job_details(job: &JobRecord, verbose: bool) {
    println!("{} Job Details", INFO);
    println!("  ID: {}", style(&job.id).cyan());
    println!("  User: {}", job.user_id);
    println!("  Prompt: {}", style(&job.prompt).bold());
    println!("  Status: {}", format_status(job.status));
    println!("  Progress: {}", style(format!("{}%", job.progress)).cyan());
    println!("  Created: {}", style(job.created_at.to_rfc3339()).dim());
    if let (Some(started), Some(completed)) = (job.started_at, job.completed_at) {
        if let Ok(duration) = completed.signed_duration_since(started).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!("  Tokens: {}", job.tokens_used);
    println!("  Retries: {}/{}", job.retry_count, job.max_retries);
    if let Some(message) = &job.error_message {
        let step = job.failed_step.map(|s| format!(" (at {})", s)).unwrap_or_default();
        println!("  {} Error{}: {}", WARN, step, style(message).red());
    }

    if verbose {
        println!("\n  {}", style("Steps:").bold());
        for (name, result) in &job.step_results {
            println!(
                "    {} {} - {:.1}s, {} tokens, {} attempt(s){}",
                if result.gate.passed { CHECK } else { WARN },
                style(name).bold(),
                result.elapsed_secs,
                result.tokens_used,
                result.attempts,
                if result.payload.is_none() { " (summary only)" } else { "" }
            );
            for issue in &result.gate.issues {
                println!("        - {}", style(issue).red());
            }
            for warning in &result.gate.warnings {
                println!("        - {}", style(warning).dim());
            }
        }
    }
}

async fn show_history(cmd: &HistoryCommand, cli: &Cli) -> Result<()> {
    let filter = cmd.to_filter().map_err(anyhow::Error::msg)?;
    let store = open_store(cli, false).await?;
    let jobs = store.list_jobs(&filter).await?;

    if cmd.json {
        let data = serde_json::json!({ "jobs": jobs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("{} No jobs found", INFO);
        return Ok(());
    }

    println!("{} Job history (showing latest {}):", INFO, cmd.limit);
    for job in &jobs {
        println!("  {}", format_job_summary(job));
    }
    Ok(())
}

async fn cancel(cmd: &CancelCommand, cli: &Cli) -> Result<()> {
    let orchestrator = build_orchestrator(cli, false).await?;
    let status = orchestrator.cancel(&cmd.job_id).await?;
    println!(
        "{} Job {} is now {}",
        INFO,
        style(&cmd.job_id).cyan(),
        format_status(status)
    );
    Ok(())
}

async fn cleanup(cmd: &CleanupCommand, cli: &Cli) -> Result<()> {
    let store = open_store(cli, false).await?;
    let failed = store.cleanup_stale(cmd.older_than_hours).await?;
    if failed.is_empty() {
        println!("{} No stale jobs", CHECK);
    } else {
        println!("{} Marked {} stale job(s) as failed:", WARN, failed.len());
        for id in &failed {
            println!("  {}", style(id).dim());
        }
    }
    Ok(())
}

fn validate_config(cmd: &ValidateConfigCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Configuration is valid!", CHECK);
            println!("  Retries per step: {}", style(config.max_retries_per_step).cyan());
            println!("  Lesson batch size: {}", style(config.parallel_lesson_batch_size).cyan());
            println!("  QA minimum score: {}", style(config.qa_min_score).cyan());
            println!("  Auto-fix: {}", style(config.enable_auto_fix).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
