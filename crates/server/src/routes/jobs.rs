// crates/server/src/routes/jobs.rs
//! API routes for background job visibility.
//!
//! - GET /jobs — List all active (non-terminal) jobs
//! - GET /jobs/stream — SSE stream of job progress updates

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use std::convert::Infallible;
use std::sync::Arc;

use crate::jobs::JobSnapshot;
use crate::state::AppState;

/// GET /api/jobs — List all active jobs.
async fn list_jobs(State(state): State<Arc<AppState>>) -> axum::Json<Vec<JobSnapshot>> {
    axum::Json(state.orchestrator.active_jobs())
}

/// GET /api/jobs/stream — SSE stream of all job progress updates.
async fn stream_jobs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.subscribe();

    let stream = async_stream::stream! {
        let mut rx = rx;
        while let Ok(event) = rx.recv().await {
            let json = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(json));
        }
    };

    Sse::new(stream)
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/stream", get(stream_jobs))
}
