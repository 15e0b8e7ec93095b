//! Multi-stage audio translation pipeline: transcription, text translation,
//! speech synthesis, and timing adjustment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::progress::ProgressSink;

/// Sources estimated longer than this are processed in chunks.
pub const CHUNKING_THRESHOLD_SECS: f64 = 3600.0;

/// Default chunk length for chunked processing (15 minutes).
pub const DEFAULT_CHUNK_SECS: f64 = 900.0;

/// Errors from the translation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Audio processing failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Processing cancelled")]
    Cancelled,
}

/// The multi-stage transform turning a source audio file into a translated
/// artifact.
///
/// Implementations report fractional progress through the sink with
/// monotonically non-decreasing percentages ending at or near 100 just
/// before returning. The cancellation token is a contract point: callers
/// may never fire it, and implementations may only observe it between
/// stages.
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    /// Estimate the source duration in seconds.
    fn estimate_duration_secs(&self, source: &Path) -> f64;

    /// Translate the whole file in one pass.
    async fn process_single_pass(
        &self,
        source: &Path,
        reporter: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<PathBuf, PipelineError>;

    /// Translate a long file by splitting it into `chunk_secs`-long chunks,
    /// processing each, and recombining.
    async fn process_chunked(
        &self,
        source: &Path,
        chunk_secs: f64,
        reporter: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<PathBuf, PipelineError>;
}

/// Rough size-based duration estimate: one MiB of audio ≈ one minute.
const SECS_PER_MIB: f64 = 60.0;

/// Floor for the size-based estimate.
const MIN_ESTIMATED_SECS: f64 = 30.0;

/// Fallback when the file can't be inspected.
const FALLBACK_ESTIMATED_SECS: f64 = 120.0;

/// Stand-in pipeline that walks through the real stage sequence with
/// simulated work: the artifact is a byte copy of the source, written next
/// to it so both stay inside the owning job's directory.
pub struct SimulatedPipeline {
    stage_delay: Duration,
}

impl SimulatedPipeline {
    pub fn new() -> Self {
        Self {
            stage_delay: Duration::from_secs(1),
        }
    }

    /// Override the per-stage simulated processing delay (tests use zero).
    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }

    async fn write_artifact(&self, source: &Path) -> Result<PathBuf, PipelineError> {
        let dir = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let artifact = dir.join(format!("translated_{}.mp3", Uuid::new_v4()));
        tokio::fs::copy(source, &artifact).await?;
        Ok(artifact)
    }

    fn checkpoint(cancel: &CancellationToken) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for SimulatedPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioPipeline for SimulatedPipeline {
    fn estimate_duration_secs(&self, source: &Path) -> f64 {
        match std::fs::metadata(source) {
            Ok(meta) => {
                let mib = meta.len() as f64 / (1024.0 * 1024.0);
                (mib * SECS_PER_MIB).max(MIN_ESTIMATED_SECS)
            }
            Err(e) => {
                tracing::warn!(
                    path = %source.display(),
                    error = %e,
                    "Could not estimate audio duration, using fallback"
                );
                FALLBACK_ESTIMATED_SECS
            }
        }
    }

    async fn process_single_pass(
        &self,
        source: &Path,
        reporter: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<PathBuf, PipelineError> {
        reporter.report(0.0, "Starting audio processing...");

        Self::checkpoint(&cancel)?;
        reporter.report(10.0, "Transcribing audio to English text...");
        tokio::time::sleep(self.stage_delay).await;

        Self::checkpoint(&cancel)?;
        reporter.report(40.0, "Translating text to Brazilian Portuguese...");
        tokio::time::sleep(self.stage_delay).await;

        Self::checkpoint(&cancel)?;
        reporter.report(60.0, "Synthesizing Brazilian Portuguese speech...");
        let artifact = self.write_artifact(source).await?;

        Self::checkpoint(&cancel)?;
        reporter.report(80.0, "Adjusting timing to match original audio...");
        tokio::time::sleep(self.stage_delay).await;

        reporter.report(100.0, "Audio processing completed!");
        Ok(artifact)
    }

    async fn process_chunked(
        &self,
        source: &Path,
        chunk_secs: f64,
        reporter: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<PathBuf, PipelineError> {
        reporter.report(0.0, "Starting long audio processing...");

        let duration = self.estimate_duration_secs(source);
        let num_chunks = (duration / chunk_secs).ceil().max(1.0) as usize;
        tracing::info!(duration_secs = duration, num_chunks, "Processing long audio in chunks");

        reporter.report(5.0, &format!("Splitting audio into {num_chunks} chunks..."));
        tokio::time::sleep(self.stage_delay).await;

        for i in 0..num_chunks {
            Self::checkpoint(&cancel)?;
            // Per-chunk progress scaled into the 5–85 range.
            let chunk_progress = (i as f64 / num_chunks as f64) * 80.0;
            reporter.report(
                5.0 + chunk_progress,
                &format!("Processing chunk {}/{}...", i + 1, num_chunks),
            );
            tokio::time::sleep(self.stage_delay).await;
        }

        Self::checkpoint(&cancel)?;
        reporter.report(85.0, "Combining translated chunks...");
        tokio::time::sleep(self.stage_delay).await;

        reporter.report(90.0, "Adjusting final timing to match original...");
        let artifact = self.write_artifact(source).await?;

        reporter.report(100.0, "Long audio processing completed!");
        Ok(artifact)
    }
}
