//! Source acquisition: resolving a submitted URL into local audio plus
//! descriptive metadata.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// Descriptive metadata for a fetched source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct SourceMetadata {
    pub title: String,
    pub author: String,
    /// Reported length of the source in seconds.
    pub duration_secs: u64,
}

/// A successfully fetched source: metadata plus the local audio file.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub metadata: SourceMetadata,
    pub audio_path: PathBuf,
}

/// Errors from resolving a source URL into local audio.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to write source audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a submitted URL into local audio data plus metadata.
///
/// Implementations include:
/// - `SimulatedFetcher` — fabricates metadata and audio bytes locally
/// - Future: a real platform downloader
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the source behind `source_url`, writing the audio file into
    /// `dest_dir` (created if missing).
    async fn fetch(&self, source_url: &str, dest_dir: &Path) -> Result<FetchedSource, FetchError>;
}

/// Bytes written for the fabricated audio file (~1 MiB, so the pipeline's
/// size-based duration estimate lands around one minute).
const SIMULATED_AUDIO_BYTES: usize = 1024 * 1024;

/// Fabricated source length bounds in seconds (3–15 minutes).
const MIN_SIMULATED_SECS: u64 = 180;
const MAX_SIMULATED_SECS: u64 = 900;

/// Stand-in fetcher that fabricates metadata and a local audio file instead
/// of talking to a video platform.
pub struct SimulatedFetcher {
    delay: Duration,
}

impl SimulatedFetcher {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_secs(2),
        }
    }

    /// Override the simulated network delay (tests use zero).
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    /// Pull a video id out of a watch URL. Falls back to a fixed id for
    /// URLs without a `v=` query parameter.
    fn video_id(source_url: &str) -> &str {
        match source_url.split_once("v=") {
            Some((_, rest)) => rest.split('&').next().unwrap_or("sample_video"),
            None => "sample_video",
        }
    }
}

impl Default for SimulatedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for SimulatedFetcher {
    async fn fetch(&self, source_url: &str, dest_dir: &Path) -> Result<FetchedSource, FetchError> {
        tracing::info!(url = %source_url, "Simulating source audio download");

        let video_id = Self::video_id(source_url);
        let metadata = SourceMetadata {
            title: format!("Sample Video - {video_id}"),
            author: "Sample Author".to_string(),
            duration_secs: rand::thread_rng().gen_range(MIN_SIMULATED_SECS..=MAX_SIMULATED_SECS),
        };

        tokio::fs::create_dir_all(dest_dir).await?;
        let audio_path = dest_dir.join(format!("{video_id}.mp3"));
        let mut payload = vec![0u8; SIMULATED_AUDIO_BYTES];
        rand::thread_rng().fill(payload.as_mut_slice());
        tokio::fs::write(&audio_path, &payload).await?;

        tokio::time::sleep(self.delay).await;

        tracing::info!(path = %audio_path.display(), "Simulated download complete");
        Ok(FetchedSource {
            metadata,
            audio_path,
        })
    }
}
