// crates/server/src/jobs/store.rs
//! Concurrency-safe in-memory store of job records.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::types::{JobId, JobProgressEvent, JobRecord, JobSnapshot};

/// In-memory mapping from job id to record.
///
/// The outer map lock is held only long enough to clone a per-record handle,
/// so status reads never block on, and are never blocked by, writes to
/// unrelated jobs. Read-modify-write merges on one record are serialized by
/// that record's own lock.
///
/// Every mutation publishes a [`JobProgressEvent`] on the broadcast channel
/// (consumed by the SSE route); writers never wait for subscribers.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<RwLock<JobRecord>>>>,
    events_tx: broadcast::Sender<JobProgressEvent>,
}

impl JobStore {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            jobs: RwLock::new(HashMap::new()),
            events_tx,
        }
    }

    /// Insert a fresh `Queued` record for `source_url` and return its id.
    pub fn create(&self, source_url: &str) -> JobId {
        let id = Uuid::new_v4();
        let record = JobRecord::new(id, source_url);
        let event = record.progress_event();
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(id, Arc::new(RwLock::new(record)));
            }
            Err(e) => tracing::error!("RwLock poisoned writing jobs map: {e}"),
        }
        // Ignore send errors (no subscribers is fine).
        let _ = self.events_tx.send(event);
        id
    }

    fn entry(&self, id: JobId) -> Option<Arc<RwLock<JobRecord>>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(&id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                None
            }
        }
    }

    /// Snapshot of the current record, or `None` for unknown ids.
    pub fn get(&self, id: JobId) -> Option<JobSnapshot> {
        let entry = self.entry(id)?;
        let snapshot = match entry.read() {
            Ok(record) => Some(record.snapshot()),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job {id}: {e}");
                None
            }
        };
        snapshot
    }

    /// Merge an update into the record behind `id`.
    ///
    /// A no-op for unknown ids and for terminal records — once a job is
    /// completed or failed, its record is frozen. `apply` runs under the
    /// record's write lock, so merges on the same job are atomic.
    pub fn update(&self, id: JobId, apply: impl FnOnce(&mut JobRecord)) {
        let Some(entry) = self.entry(id) else { return };
        let event = match entry.write() {
            Ok(mut record) => {
                if record.status.is_terminal() {
                    return;
                }
                apply(&mut record);
                record.updated_at = Utc::now();
                record.progress_event()
            }
            Err(e) => {
                tracing::error!("RwLock poisoned writing job {id}: {e}");
                return;
            }
        };
        let _ = self.events_tx.send(event);
    }

    /// Subscribe to job progress events (for SSE streaming).
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.events_tx.subscribe()
    }

    /// Snapshots of all non-terminal jobs.
    pub fn active(&self) -> Vec<JobSnapshot> {
        let entries: Vec<Arc<RwLock<JobRecord>>> = match self.jobs.read() {
            Ok(jobs) => jobs.values().cloned().collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                return Vec::new();
            }
        };
        entries
            .iter()
            .filter_map(|entry| entry.read().ok().map(|r| r.snapshot()))
            .filter(|s| !s.status.is_terminal())
            .collect()
    }

    /// Remove terminal records whose last update is older than `ttl`,
    /// returning the evicted ids. Non-terminal jobs are never evicted.
    pub fn evict_terminal_older_than(&self, ttl: Duration) -> Vec<JobId> {
        let cutoff = Utc::now() - ttl;
        let mut jobs = match self.jobs.write() {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!("RwLock poisoned sweeping jobs map: {e}");
                return Vec::new();
            }
        };
        let expired: Vec<JobId> = jobs
            .iter()
            .filter_map(|(id, entry)| {
                let record = entry.read().ok()?;
                (record.status.is_terminal() && record.updated_at < cutoff).then_some(*id)
            })
            .collect();
        for id in &expired {
            jobs.remove(id);
        }
        expired
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
