//! Persistence layer for durable, resumable generation jobs

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteJobStore;

use crate::core::course::{CoursePreferences, CourseRequest};
use crate::core::state::JobStatus;
use crate::core::step::PipelineStep;
use crate::validation::GateResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Error type for job store operations.
///
/// Kept separate from pipeline-logic failures so callers can tell an
/// infrastructure problem from bad generated content.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is already being run by {owner}")]
    LeaseHeld { job_id: String, owner: String },

    #[error("Failed to encode job data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable record of one step's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredStepResult {
    /// Serialized step payload; absent when intermediate results are not kept
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    pub tokens_used: u64,
    pub elapsed_secs: f64,
    /// Agent attempts spent on the step
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default)]
    pub gate: GateResult,
    pub saved_at: DateTime<Utc>,
}

fn default_attempts() -> u32 {
    1
}

impl StoredStepResult {
    pub fn new(payload: Option<serde_json::Value>, tokens_used: u64, elapsed_secs: f64) -> Self {
        Self {
            payload,
            tokens_used,
            elapsed_secs,
            attempts: 1,
            gate: GateResult::pass(),
            saved_at: Utc::now(),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_gate(mut self, gate: GateResult) -> Self {
        self.gate = gate;
        self
    }
}

/// Optional fields changed together with a status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub progress: Option<u8>,
    pub step: Option<PipelineStep>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn step(mut self, step: PipelineStep) -> Self {
        self.step = Some(step);
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Where a job would continue from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// Next step to run
    Step(PipelineStep),
    /// The final course is stored
    Completed,
}

/// Filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Filter by status
    pub status: Option<JobStatus>,
    /// Filter by requesting user
    pub user_id: Option<String>,
    /// Maximum number of results
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            user_id: None,
            limit: 50,
        }
    }
}

impl JobFilter {
    pub fn matches(&self, job: &JobRecord) -> bool {
        self.status.map_or(true, |s| job.status == s)
            && self.user_id.as_deref().map_or(true, |u| job.user_id == u)
    }
}

/// Durable state of one generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    pub preferences: CoursePreferences,
    pub status: JobStatus,
    /// Percent complete (0-100)
    pub progress: u8,
    pub current_step: Option<PipelineStep>,
    /// Stored step outputs keyed by step name
    pub step_results: BTreeMap<String, StoredStepResult>,
    pub tokens_used: u64,
    pub elapsed_secs: f64,
    pub error_message: Option<String>,
    pub failed_step: Option<PipelineStep>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub cancel_requested: bool,
    /// Orchestrator run currently allowed to write this job
    pub lease_owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// First move into Running
    pub started_at: Option<DateTime<Utc>>,
    /// Most recent move into Running; resets on every resume
    #[serde(default)]
    pub run_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a pending job for `request`
    pub fn new(request: &CourseRequest, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            prompt: request.prompt.clone(),
            preferences: request.preferences.clone(),
            status: JobStatus::Pending,
            progress: 0,
            current_step: None,
            step_results: BTreeMap::new(),
            tokens_used: 0,
            elapsed_secs: 0.0,
            error_message: None,
            failed_step: None,
            retry_count: 0,
            max_retries,
            cancel_requested: false,
            lease_owner: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            run_started_at: None,
            completed_at: None,
        }
    }

    /// The request this job was created for
    pub fn request(&self) -> CourseRequest {
        CourseRequest::new(self.user_id.clone(), self.prompt.clone())
            .with_preferences(self.preferences.clone())
    }

    pub fn step_result(&self, step: PipelineStep) -> Option<&StoredStepResult> {
        self.step_results.get(step.as_str())
    }

    /// Infer the resume point from stored results.
    ///
    /// A stored final course means the job is complete. Otherwise the next
    /// step is the one after the longest prefix of stored payloads.
    pub fn resume_point(&self) -> ResumePoint {
        let has_payload = |step: PipelineStep| {
            self.step_result(step)
                .map_or(false, |r| r.payload.is_some())
        };
        if has_payload(PipelineStep::Finalize) {
            return ResumePoint::Completed;
        }
        let next = PipelineStep::ALL
            .iter()
            .copied()
            .find(|step| !has_payload(*step))
            .unwrap_or(PipelineStep::Finalize);
        ResumePoint::Step(next)
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Apply a status transition and its bookkeeping
    pub fn apply_status(&mut self, status: JobStatus, update: StatusUpdate, now: DateTime<Utc>) {
        if status.is_running() && !self.status.is_running() {
            self.started_at.get_or_insert(now);
            self.run_started_at = Some(now);
        }
        if let JobStatus::Step(step) = status {
            self.current_step = Some(step);
        }
        if let Some(step) = update.step {
            self.current_step = Some(step);
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(message) = update.error_message {
            self.error_message = Some(message);
        }
        match status {
            JobStatus::Completed => {
                self.progress = 100;
                self.completed_at = Some(now);
                // A successful resume supersedes the earlier failure
                self.error_message = None;
                self.failed_step = None;
            }
            JobStatus::Failed | JobStatus::Cancelled => self.completed_at = Some(now),
            JobStatus::Running => self.completed_at = None,
            _ => {}
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Store (or overwrite) one step's result and recompute totals
    pub fn apply_step_result(&mut self, step: PipelineStep, result: StoredStepResult) {
        self.step_results.insert(step.as_str().to_string(), result);
        self.tokens_used = self.step_results.values().map(|r| r.tokens_used).sum();
        self.elapsed_secs = self.step_results.values().map(|r| r.elapsed_secs).sum();
        self.updated_at = Utc::now();
    }

    pub fn apply_failure(&mut self, message: &str, step: Option<PipelineStep>, now: DateTime<Utc>) {
        self.apply_status(
            JobStatus::Failed,
            StatusUpdate::new().error_message(message),
            now,
        );
        self.failed_step = step;
        self.retry_count += 1;
    }

    /// Record a cancel request; jobs nobody is running are cancelled at once
    pub fn apply_cancel(&mut self, now: DateTime<Utc>) {
        if self.status.is_terminal() && self.status != JobStatus::Failed {
            return;
        }
        self.cancel_requested = true;
        if !self.status.is_running() {
            self.apply_status(JobStatus::Cancelled, StatusUpdate::new(), now);
        }
        self.updated_at = now;
    }

    /// Whether the current run has been going longer than `threshold_hours`.
    ///
    /// Thresholds too large to represent never expire.
    pub fn is_stale(&self, threshold_hours: u64, now: DateTime<Utc>) -> bool {
        let Some(threshold) = i64::try_from(threshold_hours)
            .ok()
            .and_then(ChronoDuration::try_hours)
        else {
            return false;
        };
        let since = self
            .run_started_at
            .or(self.started_at)
            .unwrap_or(self.updated_at);
        self.status.is_running() && now.signed_duration_since(since) > threshold
    }

    pub fn apply_lease(&mut self, owner: &str) -> StoreResult<()> {
        match &self.lease_owner {
            Some(current) if current != owner => Err(StoreError::LeaseHeld {
                job_id: self.id.clone(),
                owner: current.clone(),
            }),
            _ => {
                self.lease_owner = Some(owner.to_string());
                Ok(())
            }
        }
    }
}

/// Storage for job records.
///
/// Every method is a potential suspension point. Implementations must be
/// safe for concurrent readers; writers are serialized per job by the lease.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a pending job
    async fn create_job(&self, request: &CourseRequest, max_retries: u32)
        -> StoreResult<JobRecord>;

    /// Load a job by ID
    async fn get_job(&self, id: &str) -> StoreResult<JobRecord>;

    /// Move a job to `status`, applying the optional fields in `update`
    async fn update_status(&self, id: &str, status: JobStatus, update: StatusUpdate)
        -> StoreResult<()>;

    /// Store one step's result; saving the same step again overwrites it
    async fn save_step_result(
        &self,
        id: &str,
        step: PipelineStep,
        result: StoredStepResult,
    ) -> StoreResult<()>;

    /// Mark a job failed and count the failed run
    async fn mark_failed(&self, id: &str, message: &str, step: Option<PipelineStep>)
        -> StoreResult<()>;

    /// Fail every job stuck running longer than `threshold_hours`; returns their IDs
    async fn cleanup_stale(&self, threshold_hours: u64) -> StoreResult<Vec<String>>;

    /// List jobs, most recent first
    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<JobRecord>>;

    /// Ask a job to stop at its next step boundary; returns the resulting status
    async fn request_cancel(&self, id: &str) -> StoreResult<JobStatus>;

    /// Take write ownership of a job; fails with `LeaseHeld` if another run has it
    async fn acquire_lease(&self, id: &str, owner: &str) -> StoreResult<()>;

    /// Give up write ownership (no-op if `owner` does not hold it)
    async fn release_lease(&self, id: &str, owner: &str) -> StoreResult<()>;

    async fn get_step_result(
        &self,
        id: &str,
        step: PipelineStep,
    ) -> StoreResult<Option<StoredStepResult>> {
        Ok(self.get_job(id).await?.step_result(step).cloned())
    }

    async fn get_resume_point(&self, id: &str) -> StoreResult<ResumePoint> {
        Ok(self.get_job(id).await?.resume_point())
    }

    async fn can_retry(&self, id: &str) -> StoreResult<bool> {
        Ok(self.get_job(id).await?.can_retry())
    }
}

/// In-memory job store (for testing or ephemeral use)
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    async fn modify<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut JobRecord) -> StoreResult<T> + Send,
    ) -> StoreResult<T> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        f(job)
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(
        &self,
        request: &CourseRequest,
        max_retries: u32,
    ) -> StoreResult<JobRecord> {
        let job = JobRecord::new(request, max_retries);
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> StoreResult<JobRecord> {
        let jobs = self.jobs.read().await;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        update: StatusUpdate,
    ) -> StoreResult<()> {
        self.modify(id, |job| {
            job.apply_status(status, update, Utc::now());
            Ok(())
        })
        .await
    }

    async fn save_step_result(
        &self,
        id: &str,
        step: PipelineStep,
        result: StoredStepResult,
    ) -> StoreResult<()> {
        self.modify(id, |job| {
            job.apply_step_result(step, result);
            Ok(())
        })
        .await
    }

    async fn mark_failed(
        &self,
        id: &str,
        message: &str,
        step: Option<PipelineStep>,
    ) -> StoreResult<()> {
        self.modify(id, |job| {
            job.apply_failure(message, step, Utc::now());
            Ok(())
        })
        .await
    }

    async fn cleanup_stale(&self, threshold_hours: u64) -> StoreResult<Vec<String>> {
        let now = Utc::now();
        let message = stale_message(threshold_hours);
        let mut jobs = self.jobs.write().await;
        let mut cleaned = Vec::new();
        for job in jobs.values_mut() {
            if job.is_stale(threshold_hours, now) {
                let step = job.current_step;
                job.apply_failure(&message, step, now);
                job.lease_owner = None;
                cleaned.push(job.id.clone());
            }
        }
        cleaned.sort();
        Ok(cleaned)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<JobRecord>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<JobRecord> =
            jobs.values().filter(|j| filter.matches(j)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(filter.limit);
        Ok(matching)
    }

    async fn request_cancel(&self, id: &str) -> StoreResult<JobStatus> {
        self.modify(id, |job| {
            job.apply_cancel(Utc::now());
            Ok(job.status)
        })
        .await
    }

    async fn acquire_lease(&self, id: &str, owner: &str) -> StoreResult<()> {
        self.modify(id, |job| job.apply_lease(owner)).await
    }

    async fn release_lease(&self, id: &str, owner: &str) -> StoreResult<()> {
        self.modify(id, |job| {
            if job.lease_owner.as_deref() == Some(owner) {
                job.lease_owner = None;
            }
            Ok(())
        })
        .await
    }
}

pub(crate) fn stale_message(threshold_hours: u64) -> String {
    format!(
        "Job timed out: still running after more than {} hour(s)",
        threshold_hours
    )
}
