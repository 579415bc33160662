//! Compozit Server: asynchronous job execution with live WebSocket updates.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use compozit_api::{AppState, build_router};
use compozit_core::config::AppConfig;
use compozit_core::error::AppError;
use compozit_entity::JobKind;
use compozit_realtime::{JobEventBridge, NotificationHub};
use compozit_worker::processors::StagedProcessor;
use compozit_worker::{JobRuntime, MemoryJobRegistry, ProcessorRegistry};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("COMPOZIT_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Compozit v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Notification hub ─────────────────────────────────
    let hub = Arc::new(NotificationHub::new(config.realtime.clone()));

    // ── Step 2: Processors ───────────────────────────────────────
    let processors = JobKind::ALL
        .into_iter()
        .fold(ProcessorRegistry::new(), |registry, kind| {
            registry.with(Arc::new(StagedProcessor::for_kind(kind)))
        });
    tracing::info!(kinds = ?processors.registered_kinds(), "Processors registered");

    // ── Step 3: Job runtime ──────────────────────────────────────
    let runtime = JobRuntime::start(
        &config.worker,
        Arc::new(MemoryJobRegistry::new()),
        processors,
        Arc::new(JobEventBridge::new(Arc::clone(&hub))),
    );

    // ── Step 4: HTTP server ──────────────────────────────────────
    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), runtime.queue(), Arc::clone(&hub));
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Compozit server listening on {}", addr);

    // ── Step 5: Graceful shutdown ────────────────────────────────
    // The hub is closed as soon as the signal arrives so open sockets do
    // not hold the HTTP server's graceful drain open.
    let shutdown_hub = Arc::clone(&hub);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        shutdown_hub.close_all();
    });

    let grace = std::time::Duration::from_secs(config.server.shutdown_grace_seconds);
    let served = server.await;

    tracing::info!("Draining job runtime...");
    if tokio::time::timeout(grace.max(config.worker.shutdown_timeout() * 2), runtime.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Job runtime did not stop within the grace period");
    }
    hub.close_all();

    served.map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Compozit server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
