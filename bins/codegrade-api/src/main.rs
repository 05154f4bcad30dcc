mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use codegrade_common::config::LanguageConfigManager;
use codegrade_common::settings::Settings;
use codegrade_engine::{ExecutionEngine, ToolchainRegistry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub struct AppState {
    pub engine: ExecutionEngine,
    /// Bounds how many jobs compile or run at once.
    pub permits: Semaphore,
}

impl AppState {
    pub fn new(engine: ExecutionEngine) -> Self {
        let permits = Semaphore::new(engine.settings().max_concurrent_jobs);
        Self { engine, permits }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Codegrade API booting...");

    let settings = Settings::from_env();
    let manager = LanguageConfigManager::load(&settings.languages_path).with_context(|| {
        format!(
            "Failed to load language configuration from {}",
            settings.languages_path.display()
        )
    })?;

    let registry = ToolchainRegistry::from_config(&manager);
    if registry.is_empty() {
        warn!(
            path = %settings.languages_path.display(),
            "No languages configured; every job will be rejected"
        );
    }
    info!(
        languages = ?registry.languages(),
        path = %settings.languages_path.display(),
        "Loaded language configuration"
    );

    let bind_addr = settings.bind_addr.clone();
    info!(
        max_concurrent_jobs = settings.max_concurrent_jobs,
        default_timeout_secs = settings.default_timeout.as_secs(),
        max_timeout_secs = settings.max_timeout.as_secs(),
        work_root = %settings.work_root.display(),
        "Engine settings"
    );

    let state = Arc::new(AppState::new(ExecutionEngine::new(registry, settings)));
    let app = routes::app(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("HTTP server listening on {}", bind_addr);
    info!("Ready to accept jobs");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining in-flight jobs");
}
