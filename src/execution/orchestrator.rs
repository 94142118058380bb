//! Orchestrator - drives a job through the six steps

use crate::agent::{AgentError, AgentExecutor, AgentKind, AgentOutput, AgentTask};
use crate::core::config::PipelineConfig;
use crate::core::context::LessonGenerationContext;
use crate::core::course::{CourseMetadata, CourseRequest, GeneratedCourse};
use crate::core::state::{JobStatus, PipelineState, StateError};
use crate::core::step::{GatePolicy, PipelineStep, StepPayload, StepResult};
use crate::execution::events::{EventSink, ProgressStream};
use crate::execution::parallel::{validate_lessons, ParallelContentExecutor};
use crate::execution::{PipelineError, StepExecutor};
use crate::persistence::{JobRecord, JobStore, ResumePoint, StatusUpdate, StoreError, StoredStepResult};
use crate::validation::autofix::{fix_assessments, fix_curriculum, fix_intent, fix_qa};
use crate::validation::{
    validate_assessments, validate_curriculum, validate_full_course, validate_intent, validate_qa,
    GateResult,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs generation jobs against an agent and a job store.
///
/// Cheap to clone; clones share the agent, store and config.
pub struct Orchestrator<A> {
    store: Arc<dyn JobStore>,
    config: Arc<PipelineConfig>,
    steps: StepExecutor<A>,
    content: ParallelContentExecutor<A>,
}

impl<A> Clone for Orchestrator<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            steps: self.steps.clone(),
            content: self.content.clone(),
        }
    }
}

impl<A: AgentExecutor + 'static> Orchestrator<A> {
    pub fn new(agent: Arc<A>, store: Arc<dyn JobStore>, config: PipelineConfig) -> Self {
        let config = Arc::new(config);
        let steps = StepExecutor::new(agent, Arc::clone(&config));
        let content = ParallelContentExecutor::new(steps.clone());
        Self {
            store,
            config,
            steps,
            content,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Generate a course for a new job
    pub async fn generate(&self, request: CourseRequest) -> Result<GeneratedCourse, PipelineError> {
        self.generate_with_resume(request, None).await
    }

    /// Generate a course, continuing `resume_job_id` when given instead of
    /// creating a new job
    pub async fn generate_with_resume(
        &self,
        request: CourseRequest,
        resume_job_id: Option<&str>,
    ) -> Result<GeneratedCourse, PipelineError> {
        match resume_job_id {
            Some(job_id) => self.resume(job_id).await,
            None => {
                let job = self.create_job(&request).await?;
                self.execute_job(job, &EventSink::disabled()).await
            }
        }
    }

    /// Continue a job from its last durable step
    pub async fn resume(&self, job_id: &str) -> Result<GeneratedCourse, PipelineError> {
        let job = self.load_job(job_id).await?;
        self.execute_job(job, &EventSink::disabled()).await
    }

    /// Start a new job in the background and stream its progress.
    ///
    /// The first event is `Started` (carrying the job ID) and the last is
    /// either `Completed` or `Error`.
    pub async fn generate_with_streaming(
        &self,
        request: CourseRequest,
    ) -> Result<ProgressStream, PipelineError> {
        let job = self.create_job(&request).await?;
        Ok(self.spawn_streaming(job))
    }

    /// Resume a job in the background and stream its progress
    pub async fn resume_with_streaming(&self, job_id: &str) -> Result<ProgressStream, PipelineError> {
        let job = self.load_job(job_id).await?;
        Ok(self.spawn_streaming(job))
    }

    /// Ask a job to stop at its next step boundary
    pub async fn cancel(&self, job_id: &str) -> Result<JobStatus, PipelineError> {
        let status = self
            .store
            .request_cancel(job_id)
            .await
            .map_err(|e| not_found_or_store(job_id, None, e))?;
        info!("Cancellation requested for job {} (now {})", job_id, status);
        Ok(status)
    }

    fn spawn_streaming(&self, job: JobRecord) -> ProgressStream {
        let (sink, stream) = EventSink::channel();
        let this = self.clone();
        tokio::spawn(async move {
            // Failures reach the caller as an `Error` event.
            if let Err(e) = this.execute_job(job, &sink).await {
                debug!("Streaming run ended with error: {}", e);
            }
        });
        stream
    }

    async fn create_job(&self, request: &CourseRequest) -> Result<JobRecord, PipelineError> {
        let job = self
            .store
            .create_job(request, self.config.job_max_retries)
            .await
            .map_err(PipelineError::store(None))?;
        info!("Created job {} for user {}", job.id, job.user_id);
        Ok(job)
    }

    async fn load_job(&self, job_id: &str) -> Result<JobRecord, PipelineError> {
        self.store
            .get_job(job_id)
            .await
            .map_err(|e| not_found_or_store(job_id, None, e))
    }

    /// Run a job under its lease and the overall generation deadline
    async fn execute_job(&self, job: JobRecord, sink: &EventSink) -> Result<GeneratedCourse, PipelineError> {
        let result = match self.check_runnable(&job) {
            Ok(Some(course)) => {
                info!("Job {} already completed; returning stored course", job.id);
                sink.started(&job.id, PipelineStep::Finalize, 100);
                Ok(course)
            }
            Ok(None) => self.run_leased(&job, sink).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(course) => sink.completed(course),
            Err(e) => sink.error(e),
        }
        result
    }

    /// Decide whether a loaded job may run; a finished job yields its course
    fn check_runnable(&self, job: &JobRecord) -> Result<Option<GeneratedCourse>, PipelineError> {
        if job.resume_point() == ResumePoint::Completed {
            return stored_course(job).map(Some);
        }

        match job.status {
            JobStatus::Cancelled => Err(PipelineError::Cancelled {
                job_id: job.id.clone(),
                step: job.current_step.unwrap_or(PipelineStep::Intent),
            }),
            JobStatus::Failed if !job.can_retry() => Err(PipelineError::RetryBudgetExhausted {
                job_id: job.id.clone(),
                max_retries: job.max_retries,
            }),
            _ => Ok(None),
        }
    }

    async fn run_leased(&self, job: &JobRecord, sink: &EventSink) -> Result<GeneratedCourse, PipelineError> {
        let owner = Uuid::new_v4().to_string();
        self.store
            .acquire_lease(&job.id, &owner)
            .await
            .map_err(PipelineError::store(None))?;

        let deadline = self.config.generation_timeout();
        let result = match timeout(deadline, self.run_steps(job, sink)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                step: None,
                secs: deadline.as_secs(),
            }),
        };

        if let Err(e) = &result {
            self.record_failure(&job.id, e).await;
        }

        if let Err(e) = self.store.release_lease(&job.id, &owner).await {
            warn!("Failed to release lease on job {}: {}", job.id, e);
        }
        result
    }

    /// Write a failed run back to the job record
    async fn record_failure(&self, job_id: &str, err: &PipelineError) {
        error!("Job {} failed: {}", job_id, err);
        if !err.marks_job() {
            return;
        }

        let outcome = match err {
            PipelineError::Cancelled { step, .. } => {
                self.store
                    .update_status(job_id, JobStatus::Cancelled, StatusUpdate::new().step(*step))
                    .await
            }
            _ => {
                let step = match err.step() {
                    Some(step) => Some(step),
                    None => self.store.get_job(job_id).await.ok().and_then(|j| j.current_step),
                };
                self.store.mark_failed(job_id, &err.to_string(), step).await
            }
        };

        if let Err(e) = outcome {
            warn!("Could not record failure of job {}: {}", job_id, e);
        }
    }

    async fn run_steps(&self, job: &JobRecord, sink: &EventSink) -> Result<GeneratedCourse, PipelineError> {
        let mut state = PipelineState::restore(job)?;
        let job_id = job.id.as_str();
        let from_step = state.current_step();

        if from_step == PipelineStep::Intent {
            info!("Starting job {}", job_id);
        } else {
            info!(
                "Resuming job {} at step {} ({} step(s) restored)",
                job_id,
                from_step,
                state.completed_steps().len()
            );
        }
        sink.started(job_id, from_step, state.progress());
        self.store
            .update_status(job_id, JobStatus::Running, StatusUpdate::new().progress(state.progress()))
            .await
            .map_err(PipelineError::store(None))?;

        while !state.is_finished() {
            let step = state.current_step();
            self.check_cancelled(job_id, step).await?;

            let (start, end) = step.progress_range();
            self.store
                .update_status(job_id, JobStatus::Step(step), StatusUpdate::new().progress(start).step(step))
                .await
                .map_err(PipelineError::store(Some(step)))?;
            info!("Job {}: step {}/6 ({})", job_id, step.number(), step);

            let result = match step {
                PipelineStep::Intent => self.run_intent(&state, sink).await?,
                PipelineStep::Curriculum => self.run_curriculum(&state, sink).await?,
                PipelineStep::Content => self.run_content(&state, sink).await?,
                PipelineStep::Assessments => self.run_assessments(&state, sink).await?,
                PipelineStep::QaReview => self.run_qa(&state, sink).await?,
                PipelineStep::Finalize => self.run_finalize(&state).await?,
            };

            self.persist(job_id, &result).await?;
            state.record(result)?;
            sink.progress(step, end, format!("Step {} complete", step));
        }

        let course = state
            .course()
            .cloned()
            .ok_or(StateError::MissingArtifact(PipelineStep::Finalize))?;

        self.store
            .update_status(job_id, JobStatus::Completed, StatusUpdate::new().progress(100))
            .await
            .map_err(PipelineError::store(Some(PipelineStep::Finalize)))?;
        info!(
            "Job {} completed: {} lesson(s), {} tokens",
            job_id,
            course.lessons.len(),
            course.metadata.tokens_used
        );
        Ok(course)
    }

    async fn check_cancelled(&self, job_id: &str, step: PipelineStep) -> Result<(), PipelineError> {
        let job = self
            .store
            .get_job(job_id)
            .await
            .map_err(PipelineError::store(Some(step)))?;
        if job.cancel_requested {
            info!("Job {} cancelled before step {}", job_id, step);
            return Err(PipelineError::Cancelled {
                job_id: job_id.to_string(),
                step,
            });
        }
        Ok(())
    }

    async fn persist(&self, job_id: &str, result: &StepResult) -> Result<(), PipelineError> {
        let step = result.step;
        // The finished course is always kept so a completed job can be re-read.
        let payload = if self.config.save_intermediate_results || step == PipelineStep::Finalize {
            Some(
                result
                    .payload
                    .to_json()
                    .map_err(|e| PipelineError::store(Some(step))(StoreError::from(e)))?,
            )
        } else {
            None
        };

        let stored = StoredStepResult::new(payload, result.tokens_used, result.duration.as_secs_f64())
            .with_attempts(result.retries + 1)
            .with_gate(result.gate.clone());
        self.store
            .save_step_result(job_id, step, stored)
            .await
            .map_err(PipelineError::store(Some(step)))?;
        debug!("Saved result of step {} for job {}", step, job_id);
        Ok(())
    }

    /// Run the gate on `value`, try auto-fix once, then apply the step's
    /// gate policy
    fn apply_gate<T>(
        &self,
        step: PipelineStep,
        value: T,
        gate: impl Fn(&T) -> GateResult,
        fix: impl Fn(&T, &GateResult) -> Option<T>,
    ) -> Result<(T, GateResult), PipelineError> {
        let mut value = value;
        let mut verdict = gate(&value);

        if !verdict.passed && verdict.fixable && self.config.enable_auto_fix {
            if let Some(fixed) = fix(&value, &verdict) {
                info!(
                    "Auto-fixed step {} ({})",
                    step,
                    verdict.issue_messages().join("; ")
                );
                value = fixed;
                verdict = gate(&value);
            }
        }

        self.enforce(step, &verdict)?;
        Ok((value, verdict))
    }

    fn enforce(&self, step: PipelineStep, verdict: &GateResult) -> Result<(), PipelineError> {
        for warning in &verdict.warnings {
            debug!("Step {} warning: {}", step, warning);
        }
        if verdict.passed {
            return Ok(());
        }
        match self.config.gate_policy(step) {
            GatePolicy::Strict => Err(PipelineError::Gate {
                step,
                issues: verdict.issue_messages(),
            }),
            GatePolicy::Lenient => {
                warn!(
                    "Step {} failed validation, continuing: {}",
                    step,
                    verdict.issue_messages().join("; ")
                );
                Ok(())
            }
        }
    }

    /// Call the step's agent, gate the output and package it as a result
    async fn run_agent_step<T>(
        &self,
        step: PipelineStep,
        task: AgentTask,
        sink: &EventSink,
        extract: fn(AgentOutput) -> Option<T>,
        gate: impl Fn(&T) -> GateResult,
        fix: impl Fn(&T, &GateResult) -> Option<T>,
        wrap: fn(T) -> StepPayload,
    ) -> Result<StepResult, PipelineError> {
        let started = Instant::now();
        let agent = task.kind();
        sink.agent_working(step, agent, step.progress_range().0, working_message(agent));

        let run = self.steps.run(step, task).await?;
        let got = run.output.kind();
        let value = extract(run.output).ok_or(PipelineError::Agent {
            step,
            attempts: run.attempts,
            source: AgentError::UnexpectedOutput { expected: agent, got },
        })?;

        let (value, verdict) = self.apply_gate(step, value, gate, fix)?;
        Ok(StepResult::new(wrap(value), verdict)
            .with_duration(started.elapsed())
            .with_retries(run.attempts - 1)
            .with_tokens(run.tokens_used))
    }

    async fn run_intent(&self, state: &PipelineState, sink: &EventSink) -> Result<StepResult, PipelineError> {
        let task = AgentTask::AnalyzeIntent {
            request: state.request.clone(),
        };
        self.run_agent_step(
            PipelineStep::Intent,
            task,
            sink,
            |output| match output {
                AgentOutput::Intent(v) => Some(v),
                _ => None,
            },
            validate_intent,
            fix_intent,
            StepPayload::Intent,
        )
        .await
    }

    async fn run_curriculum(&self, state: &PipelineState, sink: &EventSink) -> Result<StepResult, PipelineError> {
        let intent = state.require_intent()?;
        let task = AgentTask::DesignCurriculum {
            intent: intent.clone(),
            preferences: state.request.preferences.clone(),
        };
        self.run_agent_step(
            PipelineStep::Curriculum,
            task,
            sink,
            |output| match output {
                AgentOutput::Curriculum(v) => Some(v),
                _ => None,
            },
            |curriculum| validate_curriculum(curriculum, intent),
            fix_curriculum,
            StepPayload::Curriculum,
        )
        .await
    }

    async fn run_content(&self, state: &PipelineState, sink: &EventSink) -> Result<StepResult, PipelineError> {
        let step = PipelineStep::Content;
        let started = Instant::now();
        let intent = state.require_intent()?;
        let curriculum = state.require_curriculum()?;
        let contexts = LessonGenerationContext::build_all(curriculum, intent);
        let batch_size = self.config.parallel_lesson_batch_size.max(1);

        let (start, end) = step.progress_range();
        sink.agent_working(
            step,
            AgentKind::ContentAuthor,
            start,
            format!("Writing {} lesson(s)", contexts.len()),
        );

        let on_lesson = |done: usize, total: usize| {
            if done % batch_size == 0 || done == total {
                let span = u32::from(end - start);
                let percent = start as u32 + span * done as u32 / total.max(1) as u32;
                sink.lesson_complete(done, total, percent as u8);
            }
        };
        let batch = self
            .content
            .generate_lessons_parallel(&contexts, batch_size, &on_lesson)
            .await;

        let verdict = validate_lessons(&batch.lessons, curriculum);
        self.enforce(step, &verdict)?;

        Ok(StepResult::new(StepPayload::Content(batch.lessons), verdict)
            .with_duration(started.elapsed())
            .with_tokens(batch.tokens_used))
    }

    async fn run_assessments(&self, state: &PipelineState, sink: &EventSink) -> Result<StepResult, PipelineError> {
        let intent = state.require_intent()?;
        let curriculum = state.require_curriculum()?;
        let lessons = state.require_lessons()?;
        let task = AgentTask::DesignAssessments {
            intent: intent.clone(),
            curriculum: curriculum.clone(),
            lessons: lessons.to_vec(),
        };
        self.run_agent_step(
            PipelineStep::Assessments,
            task,
            sink,
            |output| match output {
                AgentOutput::Assessments(v) => Some(v),
                _ => None,
            },
            |assessments| validate_assessments(assessments, curriculum),
            |assessments, verdict| fix_assessments(assessments, curriculum, verdict),
            StepPayload::Assessments,
        )
        .await
    }

    async fn run_qa(&self, state: &PipelineState, sink: &EventSink) -> Result<StepResult, PipelineError> {
        let task = AgentTask::ReviewQuality {
            intent: state.require_intent()?.clone(),
            curriculum: state.require_curriculum()?.clone(),
            lessons: state.require_lessons()?.to_vec(),
            assessments: state.require_assessments()?.clone(),
        };
        self.run_agent_step(
            PipelineStep::QaReview,
            task,
            sink,
            |output| match output {
                AgentOutput::QaReport(v) => Some(v),
                _ => None,
            },
            validate_qa,
            fix_qa,
            StepPayload::QaReview,
        )
        .await
    }

    /// Cross-check every artifact and assemble the course
    async fn run_finalize(&self, state: &PipelineState) -> Result<StepResult, PipelineError> {
        let step = PipelineStep::Finalize;
        let started = Instant::now();
        let intent = state.require_intent()?;
        let curriculum = state.require_curriculum()?;
        let lessons = state.require_lessons()?;
        let assessments = state.require_assessments()?;
        let qa_report = state.require_qa_report()?;

        let verdict = validate_full_course(intent, curriculum, lessons, assessments, qa_report);
        self.enforce(step, &verdict)?;

        let qa_flagged = qa_report.overall_score < self.config.qa_min_score;
        if qa_flagged {
            warn!(
                "Job {}: QA score {:.1} is below the minimum of {:.1}",
                state.job_id, qa_report.overall_score, self.config.qa_min_score
            );
        }

        let mut warnings = state.gate_warnings();
        warnings.extend(verdict.warnings.iter().map(|w| format!("[{}] {}", step, w)));

        let course = GeneratedCourse {
            job_id: state.job_id.clone(),
            intent: intent.clone(),
            curriculum: curriculum.clone(),
            lessons: lessons.to_vec(),
            assessments: assessments.clone(),
            qa_report: qa_report.clone(),
            metadata: CourseMetadata {
                generated_at: Utc::now(),
                total_duration_secs: (state.total_duration + started.elapsed()).as_secs_f64(),
                tokens_used: state.tokens_used(),
                fallback_lessons: lessons.iter().filter(|l| l.is_fallback).count(),
                qa_flagged,
                warnings,
            },
        };

        Ok(StepResult::new(StepPayload::Finalize(Box::new(course)), verdict)
            .with_duration(started.elapsed()))
    }
}

fn working_message(agent: AgentKind) -> &'static str {
    match agent {
        AgentKind::IntentAnalyzer => "Analyzing the request",
        AgentKind::CurriculumDesigner => "Designing the curriculum",
        AgentKind::ContentAuthor => "Writing lessons",
        AgentKind::AssessmentDesigner => "Designing assessments",
        AgentKind::QualityReviewer => "Reviewing course quality",
    }
}

/// The finished course of a completed job; earlier payloads may be absent
fn stored_course(job: &JobRecord) -> Result<GeneratedCourse, PipelineError> {
    let step = PipelineStep::Finalize;
    let value = job
        .step_result(step)
        .and_then(|stored| stored.payload.clone())
        .ok_or(StateError::MissingArtifact(step))?;
    match StepPayload::from_json(step, value) {
        Ok(StepPayload::Finalize(course)) => Ok(*course),
        Ok(_) => Err(StateError::MissingArtifact(step).into()),
        Err(e) => Err(StateError::CorruptResult {
            step,
            message: e.to_string(),
        }
        .into()),
    }
}

fn not_found_or_store(job_id: &str, step: Option<PipelineStep>, err: StoreError) -> PipelineError {
    match err {
        StoreError::NotFound(_) => PipelineError::JobNotFound(job_id.to_string()),
        source => PipelineError::Store { step, source },
    }
}
