//! Centralized path functions for job working storage.
//!
//! Single source of truth — every fetched source and produced artifact lives
//! under one job's directory, and no job touches another's files.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Default work root: `<system temp dir>/tubedub/`.
pub fn default_work_root() -> PathBuf {
    std::env::temp_dir().join("tubedub")
}

/// Working directory owned by a single job: `<root>/<job id>/`.
pub fn job_dir(root: &Path, job_id: Uuid) -> PathBuf {
    root.join(job_id.to_string())
}
