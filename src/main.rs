use rust_troubleshoot::agents::LlmPhaseExecutor;
use rust_troubleshoot::api::{run_server, AppState};
use rust_troubleshoot::config::AppConfig;
use rust_troubleshoot::engine::{InMemorySessionStore, InvestigationEngine};
use rust_troubleshoot::llm::factory::build_router;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Setup Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Troubleshoot Agent...");

    // Load Configuration
    let config = AppConfig::load()?;
    info!(
        "Loaded Configuration: {} tiers, cache {}",
        config.tiers.len(),
        if config.cache.enabled { "enabled" } else { "disabled" }
    );

    // Initialize Router
    info!("Initializing LLM Router...");
    let router = Arc::new(build_router(&config));
    let executor = Arc::new(LlmPhaseExecutor::from_config(&config.router));

    // Session store with periodic expiry sweep
    let store = InMemorySessionStore::new(Duration::from_secs(config.sessions.ttl_secs));
    let _sweeper = match store.start_sweeper(&config.sessions.sweep_cron).await {
        Ok(scheduler) => Some(scheduler),
        Err(e) => {
            warn!("⚠️ Failed to start session sweeper: {}", e);
            None
        }
    };

    let engine = InvestigationEngine::new(executor, router, Arc::new(store), config.engine.clone());
    let app_state = Arc::new(AppState { engine, config });

    // Start API Server
    info!("Initializing API Server...");
    run_server(app_state).await?;

    Ok(())
}
