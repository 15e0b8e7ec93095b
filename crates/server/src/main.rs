// crates/server/src/main.rs
//! Tubedub server binary.
//!
//! Starts the Axum HTTP server immediately; translation jobs are spawned on
//! demand by submissions and polled via the status endpoint. A periodic
//! sweep evicts expired terminal jobs and their working files.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tubedub_core::{default_work_root, SimulatedFetcher, SimulatedPipeline};
use tubedub_server::create_app;
use tubedub_server::jobs::JobOrchestrator;

/// Default port for the server.
const DEFAULT_PORT: u16 = 47311;

/// Terminal jobs older than this are evicted (24 hours).
const DEFAULT_JOB_TTL_SECS: u64 = 86_400;

/// How often the retention sweep runs (10 minutes).
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Get the server port from environment or use default.
fn get_port() -> u16 {
    std::env::var("TUBEDUB_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Get the work root for job files from environment or use the temp dir.
fn get_work_root() -> PathBuf {
    std::env::var("TUBEDUB_WORK_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(default_work_root)
}

/// Read a seconds value from the environment with a fallback.
fn env_secs(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print banner
    eprintln!("\n\u{1f39e} tubedub v{}\n", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve and create the work root for job files
    let work_root = get_work_root();
    std::fs::create_dir_all(&work_root)?;

    // Step 2: Build the orchestrator with the shipped (simulated) collaborators
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::new(SimulatedFetcher::new()),
        Arc::new(SimulatedPipeline::new()),
        work_root.clone(),
    ));

    // Step 3: Build the Axum app
    let app = create_app(orchestrator.clone());

    // Step 4: Bind and start the HTTP server
    let port = get_port();
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, work_root = %work_root.display(), "tubedub server listening");
    eprintln!("  \u{2192} http://localhost:{port}\n");

    // Step 5: Spawn the periodic retention sweep. Terminal jobs never leave
    // the map on their own, and their working files never delete themselves.
    let ttl = chrono::Duration::seconds(env_secs("TUBEDUB_JOB_TTL_SECS", DEFAULT_JOB_TTL_SECS) as i64);
    let sweep_interval = Duration::from_secs(env_secs(
        "TUBEDUB_SWEEP_INTERVAL_SECS",
        DEFAULT_SWEEP_INTERVAL_SECS,
    ));
    let sweeper = orchestrator.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            sweeper.sweep_expired(ttl);
        }
    });

    // Step 6: Serve forever
    axum::serve(listener, app).await?;

    Ok(())
}
