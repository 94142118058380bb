//! SQLite-based job store

use crate::core::course::CourseRequest;
use crate::core::state::JobStatus;
use crate::core::step::PipelineStep;
use crate::persistence::{
    stale_message, JobFilter, JobRecord, JobStore, StatusUpdate, StoreError, StoreResult,
    StoredStepResult,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

const JOB_COLUMNS: &str = "id, user_id, prompt, preferences, status, progress, current_step, \
     step_results, tokens_used, elapsed_secs, error_message, failed_step, retry_count, \
     max_retries, cancel_requested, lease_owner, created_at, updated_at, started_at, completed_at, run_started_at";

/// SQLite job store
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Open (or create) a store at `db_path`; `":memory:"` gives a private database
    pub async fn new(db_path: &str) -> StoreResult<Self> {
        let in_memory = db_path == ":memory:";
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to ":memory:" is a separate database, so keep exactly one alive.
        let mut pool_options = SqlitePoolOptions::new().max_connections(4);
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> StoreResult<Self> {
        let path = Self::default_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        Self::open(&path).await
    }

    pub async fn open(path: &Path) -> StoreResult<Self> {
        let path = path.to_str().ok_or_else(|| {
            StoreError::Unavailable(format!("Database path is not UTF-8: {}", path.display()))
        })?;
        Self::new(path).await
    }

    /// `<data dir>/coursegen/jobs.db`
    pub fn default_path() -> std::path::PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("coursegen")
            .join("jobs.db")
    }

    /// Initialize database schema
    async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                prompt TEXT NOT NULL,
                preferences TEXT NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                current_step TEXT,
                step_results TEXT NOT NULL DEFAULT '{}',
                tokens_used INTEGER NOT NULL DEFAULT 0,
                elapsed_secs REAL NOT NULL DEFAULT 0.0,
                error_message TEXT,
                failed_step TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 3,
                cancel_requested INTEGER NOT NULL DEFAULT 0,
                lease_owner TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                run_started_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_user_id ON jobs(user_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Databases created before per-run start times were tracked
        let has_run_started = sqlx::query(
            "SELECT 1 FROM pragma_table_info('jobs') WHERE name = 'run_started_at'",
        )
        .fetch_optional(&self.pool)
        .await?
        .is_some();
        if !has_run_started {
            sqlx::query("ALTER TABLE jobs ADD COLUMN run_started_at TEXT")
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Transaction that holds the write lock from its first statement
    async fn begin_write(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn parse_step(value: Option<String>) -> StoreResult<Option<PipelineStep>> {
        value
            .map(|s| s.parse::<PipelineStep>().map_err(StoreError::Backend))
            .transpose()
    }

    fn row_to_job(row: &SqliteRow) -> StoreResult<JobRecord> {
        let status: String = row.try_get("status")?;
        Ok(JobRecord {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            prompt: row.try_get("prompt")?,
            preferences: serde_json::from_str(&row.try_get::<String, _>("preferences")?)?,
            status: status.parse::<JobStatus>().map_err(StoreError::Backend)?,
            progress: row.try_get::<i64, _>("progress")?.clamp(0, 100) as u8,
            current_step: Self::parse_step(row.try_get("current_step")?)?,
            step_results: serde_json::from_str(&row.try_get::<String, _>("step_results")?)?,
            tokens_used: row.try_get::<i64, _>("tokens_used")? as u64,
            elapsed_secs: row.try_get("elapsed_secs")?,
            error_message: row.try_get("error_message")?,
            failed_step: Self::parse_step(row.try_get("failed_step")?)?,
            retry_count: row.try_get::<i64, _>("retry_count")? as u32,
            max_retries: row.try_get::<i64, _>("max_retries")? as u32,
            cancel_requested: row.try_get("cancel_requested")?,
            lease_owner: row.try_get("lease_owner")?,
            created_at: Self::from_naive(row.try_get("created_at")?),
            updated_at: Self::from_naive(row.try_get("updated_at")?),
            started_at: row
                .try_get::<Option<NaiveDateTime>, _>("started_at")?
                .map(Self::from_naive),
            run_started_at: row
                .try_get::<Option<NaiveDateTime>, _>("run_started_at")?
                .map(Self::from_naive),
            completed_at: row
                .try_get::<Option<NaiveDateTime>, _>("completed_at")?
                .map(Self::from_naive),
        })
    }

    async fn fetch_job(tx: &mut Transaction<'_, Sqlite>, id: &str) -> StoreResult<JobRecord> {
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn write_job(tx: &mut Transaction<'_, Sqlite>, job: &JobRecord) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO jobs ({}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            JOB_COLUMNS
        ))
        .bind(&job.id)
        .bind(&job.user_id)
        .bind(&job.prompt)
        .bind(serde_json::to_string(&job.preferences)?)
        .bind(job.status.as_str())
        .bind(job.progress as i64)
        .bind(job.current_step.map(PipelineStep::as_str))
        .bind(serde_json::to_string(&job.step_results)?)
        .bind(job.tokens_used as i64)
        .bind(job.elapsed_secs)
        .bind(&job.error_message)
        .bind(job.failed_step.map(PipelineStep::as_str))
        .bind(job.retry_count as i64)
        .bind(job.max_retries as i64)
        .bind(job.cancel_requested)
        .bind(&job.lease_owner)
        .bind(Self::to_naive(job.created_at))
        .bind(Self::to_naive(job.updated_at))
        .bind(job.started_at.map(Self::to_naive))
        .bind(job.completed_at.map(Self::to_naive))
        .bind(job.run_started_at.map(Self::to_naive))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Read-modify-write one job inside a transaction
    async fn modify<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut JobRecord) -> StoreResult<T> + Send,
    ) -> StoreResult<T> {
        let mut tx = self.begin_write().await?;
        let mut job = Self::fetch_job(&mut tx, id).await?;
        let value = f(&mut job)?;
        Self::write_job(&mut tx, &job).await?;
        tx.commit().await?;
        Ok(value)
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create_job(
        &self,
        request: &CourseRequest,
        max_retries: u32,
    ) -> StoreResult<JobRecord> {
        let job = JobRecord::new(request, max_retries);
        let mut tx = self.pool.begin().await?;
        Self::write_job(&mut tx, &job).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> StoreResult<JobRecord> {
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
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
        let mut tx = self.begin_write().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE status NOT IN ('pending', 'completed', 'failed', 'cancelled')",
            JOB_COLUMNS
        ))
        .fetch_all(&mut *tx)
        .await?;

        let mut cleaned = Vec::new();
        for row in &rows {
            let mut job = Self::row_to_job(row)?;
            if job.is_stale(threshold_hours, now) {
                let step = job.current_step;
                job.apply_failure(&message, step, now);
                job.lease_owner = None;
                Self::write_job(&mut tx, &job).await?;
                cleaned.push(job.id);
            }
        }
        tx.commit().await?;

        cleaned.sort();
        Ok(cleaned)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<JobRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM jobs \
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2) \
             ORDER BY created_at DESC LIMIT ?3",
            JOB_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.user_id.as_deref())
        .bind(filter.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn request_cancel(&self, id: &str) -> StoreResult<JobStatus> {
        self.modify(id, |job| {
            job.apply_cancel(Utc::now());
            Ok(job.status)
        })
        .await
    }

    async fn acquire_lease(&self, id: &str, owner: &str) -> StoreResult<()> {
        // Single conditional UPDATE so two runs cannot both win.
        let result = sqlx::query(
            "UPDATE jobs SET lease_owner = ?1 WHERE id = ?2 AND (lease_owner IS NULL OR lease_owner = ?1)",
        )
        .bind(owner)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        let job = self.get_job(id).await?;
        Err(StoreError::LeaseHeld {
            job_id: job.id,
            owner: job.lease_owner.unwrap_or_default(),
        })
    }

    async fn release_lease(&self, id: &str, owner: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE jobs SET lease_owner = NULL WHERE id = ?1 AND lease_owner = ?2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            // Distinguish "not ours" from "no such job".
            self.get_job(id).await?;
        }
        Ok(())
    }
}
