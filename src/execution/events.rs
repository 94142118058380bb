//! Progress events emitted while a job runs

use crate::agent::AgentKind;
use crate::core::course::GeneratedCourse;
use crate::core::step::PipelineStep;
use crate::execution::PipelineError;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Events that can occur during a generation run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        job_id: String,
        /// Step the run starts from (not `intent` when resuming)
        from_step: PipelineStep,
        progress: u8,
    },
    AgentWorking {
        step: PipelineStep,
        agent: AgentKind,
        progress: u8,
        message: String,
    },
    Progress {
        step: PipelineStep,
        progress: u8,
        message: String,
    },
    LessonComplete {
        completed: usize,
        total: usize,
        progress: u8,
    },
    Completed {
        job_id: String,
        progress: u8,
        course: Box<GeneratedCourse>,
    },
    Error {
        step: Option<PipelineStep>,
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        issues: Vec<String>,
        progress: u8,
    },
}

impl ProgressEvent {
    pub fn progress(&self) -> u8 {
        match self {
            ProgressEvent::Started { progress, .. }
            | ProgressEvent::AgentWorking { progress, .. }
            | ProgressEvent::Progress { progress, .. }
            | ProgressEvent::LessonComplete { progress, .. }
            | ProgressEvent::Completed { progress, .. }
            | ProgressEvent::Error { progress, .. } => *progress,
        }
    }

    /// `Completed` and `Error` end a stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed { .. } | ProgressEvent::Error { .. })
    }
}

/// Stream of progress events returned by the streaming entry points
pub type ProgressStream = UnboundedReceiverStream<ProgressEvent>;

/// Sending half of a progress stream.
///
/// Percentages passed through the sink never decrease, even when a resumed
/// step reports a lower value than one already sent. A disabled sink drops
/// everything.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    high_water: Arc<AtomicU8>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, ProgressStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx: Some(tx),
            high_water: Arc::new(AtomicU8::new(0)),
        };
        (sink, UnboundedReceiverStream::new(rx))
    }

    /// Raise the high-water mark to `percent` and return the value to report
    fn clamp(&self, percent: u8) -> u8 {
        let percent = percent.min(100);
        let previous = self.high_water.fetch_max(percent, Ordering::SeqCst);
        previous.max(percent)
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // The receiver going away only means nobody is listening any more.
            let _ = tx.send(event);
        }
    }

    pub fn started(&self, job_id: &str, from_step: PipelineStep, progress: u8) {
        self.send(ProgressEvent::Started {
            job_id: job_id.to_string(),
            from_step,
            progress: self.clamp(progress),
        });
    }

    pub fn agent_working(&self, step: PipelineStep, agent: AgentKind, progress: u8, message: impl Into<String>) {
        self.send(ProgressEvent::AgentWorking {
            step,
            agent,
            progress: self.clamp(progress),
            message: message.into(),
        });
    }

    pub fn progress(&self, step: PipelineStep, progress: u8, message: impl Into<String>) {
        self.send(ProgressEvent::Progress {
            step,
            progress: self.clamp(progress),
            message: message.into(),
        });
    }

    pub fn lesson_complete(&self, completed: usize, total: usize, progress: u8) {
        self.send(ProgressEvent::LessonComplete {
            completed,
            total,
            progress: self.clamp(progress),
        });
    }

    pub fn completed(&self, course: &GeneratedCourse) {
        self.send(ProgressEvent::Completed {
            job_id: course.job_id.clone(),
            progress: self.clamp(100),
            course: Box::new(course.clone()),
        });
    }

    pub fn error(&self, error: &PipelineError) {
        self.send(ProgressEvent::Error {
            step: error.step(),
            message: error.to_string(),
            issues: error.issues().to_vec(),
            progress: self.clamp(0),
        });
    }
}
