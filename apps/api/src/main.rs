mod analysis_client;
mod config;
mod db;
mod errors;
mod evaluations;
mod models;
mod pipeline;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis_client::{AnalysisService, HttpAnalysisClient, RetryingAnalysis};
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::pipeline::{spawn_assessment_worker, AssessmentQueue};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pathways API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    // Initialize analysis client (one attempt per call, retried by the decorator)
    let transport = HttpAnalysisClient::new(
        &config.analysis_service_url,
        config.analysis_timeout,
        config.analysis_connect_timeout,
    )?;
    let analysis: Arc<dyn AnalysisService> = Arc::new(RetryingAnalysis::new(
        Arc::new(transport),
        config.retry_policy,
    ));
    info!(
        "Analysis client initialized ({}, {} attempts)",
        config.analysis_service_url, config.retry_policy.max_attempts
    );

    // Build app state and start the assessment worker
    let (queue, jobs) = AssessmentQueue::channel(config.queue_capacity);
    let state = AppState::new(store, analysis, queue, &config);
    let worker = spawn_assessment_worker(
        jobs,
        state.assessments.clone(),
        config
            .auto_generate_paths
            .then(|| state.career_paths.clone()),
        config.worker_concurrency,
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Jobs still queued are dropped; their pairs are picked up by the next trigger.
    worker.abort();
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
