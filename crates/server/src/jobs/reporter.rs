// crates/server/src/jobs/reporter.rs
//! Scaled progress reporting from the pipeline into a job's record.

use std::sync::Arc;

use tubedub_core::ProgressSink;

use super::store::JobStore;
use super::types::JobId;

/// Download owns the 0–20% band of a job and finalization owns 90–100%;
/// pipeline progress is scaled into the band between.
pub(crate) const PIPELINE_BAND_START: f64 = 20.0;
pub(crate) const PIPELINE_BAND_END: f64 = 90.0;
const PIPELINE_BAND_SCALE: f64 = 0.7;

/// Progress callback bound to one job: scales the pipeline's 0–100 percent
/// into the job's 20–90 band and keeps stored progress monotonic.
pub struct ProgressReporter {
    job_id: JobId,
    store: Arc<JobStore>,
}

impl ProgressReporter {
    pub fn new(job_id: JobId, store: Arc<JobStore>) -> Self {
        Self { job_id, store }
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, percent: f64, message: &str) {
        let scaled = (PIPELINE_BAND_START + percent * PIPELINE_BAND_SCALE).min(PIPELINE_BAND_END);
        self.store.update(self.job_id, |job| {
            // Out-of-order reports must never move progress backwards.
            job.progress = job.progress.max(scaled);
            job.message = message.to_string();
        });
    }
}
