// crates/server/src/routes/translate.rs
//! Translation job submission and status endpoints.
//!
//! - `POST /api/translate` — submit a source URL, returns the new job id
//! - `GET /api/translate/{id}` — JSON snapshot of one job (for polling)

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::jobs::JobId;
use crate::state::AppState;

/// Request body for job submission.
#[derive(Debug, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct TranslateRequest {
    pub url: String,
}

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct TranslateResponse {
    pub job_id: JobId,
}

/// POST /api/translate — submit a translation job.
///
/// Never blocks on processing: returns as soon as the job record exists and
/// its background task is scheduled.
async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslateRequest>,
) -> ApiResult<(StatusCode, Json<TranslateResponse>)> {
    let job_id = state.orchestrator.submit(&req.url)?;
    Ok((StatusCode::ACCEPTED, Json(TranslateResponse { job_id })))
}

/// GET /api/translate/{id} — poll one job's status snapshot.
///
/// Unknown (or unparsable) ids return the `not_found` shape rather than an
/// error; pollers treat it as a regular status.
async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    let snapshot = Uuid::parse_str(&id)
        .ok()
        .and_then(|id| state.orchestrator.status(id));

    match snapshot {
        Some(snap) => Json(serde_json::to_value(&snap).unwrap_or_default()),
        None => Json(serde_json::json!({
            "status": "not_found",
            "message": "Job not found",
        })),
    }
}

/// Build the translate router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/translate", post(submit))
        .route("/translate/{id}", get(status))
}
