// crates/server/src/lib.rs
//! Tubedub server library.
//!
//! This crate provides the Axum-based HTTP server for the tubedub
//! translation service: submit a source URL, poll the job's progress, and
//! pick up the translated artifact reference when the job completes.

pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;

pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use jobs::JobOrchestrator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, translate, jobs)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(orchestrator: Arc<JobOrchestrator>) -> Router {
    let state = AppState::new(orchestrator);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
