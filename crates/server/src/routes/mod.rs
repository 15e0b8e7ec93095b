// crates/server/src/routes/mod.rs
//! API route handlers for the tubedub server.

pub mod health;
pub mod jobs;
pub mod translate;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health — Health check
/// - POST /api/translate — Submit a translation job
/// - GET  /api/translate/{id} — Poll one job's status snapshot
/// - GET  /api/jobs — List active jobs
/// - GET  /api/jobs/stream — SSE stream of job progress updates
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", translate::router())
        .nest("/api", jobs::router())
        .with_state(state)
}
