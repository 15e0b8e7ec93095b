// crates/server/src/jobs/types.rs
//! Types for the background translation-job system.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tubedub_core::SourceMetadata;
use uuid::Uuid;

/// Unique identifier for a submitted job. Assigned at creation, never reused.
pub type JobId = Uuid;

/// Lifecycle state of a translation job.
///
/// `Completed` and `Failed` are terminal: a record in either state is frozen.
/// Unknown ids surface as a `not_found` response shape, never as a stored
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Downloading,
    Translating,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job has resolved and its record is frozen.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Translating => "translating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Mutable status/result record for one job. Owned by the store; mutated
/// only by the single background task bound to its id.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub source_url: String,
    pub status: JobStatus,
    /// Overall completion in [0, 100]. Non-decreasing while non-terminal.
    pub progress: f64,
    pub message: String,
    /// Populated once the source download finishes.
    pub metadata: Option<SourceMetadata>,
    /// Path of the produced output. Present only when `Completed`.
    pub artifact_path: Option<PathBuf>,
    /// Failure detail. Present only when `Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: JobId, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_url: source_url.into(),
            status: JobStatus::Queued,
            progress: 0.0,
            message: "Job created, waiting to start...".to_string(),
            metadata: None,
            artifact_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Value-typed copy handed to status callers. No aliasing into the
    /// stored record.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            source_url: self.source_url.clone(),
            video: self.metadata.clone(),
            artifact: self
                .artifact_path
                .as_deref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn progress_event(&self) -> JobProgressEvent {
        JobProgressEvent {
            job_id: self.id,
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Point-in-time copy of a job record, returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<SourceMetadata>,
    /// File name of the produced artifact; present only when completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Failure detail; present only when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Progress update published on the broadcast channel and sent via SSE.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub timestamp: String,
}
