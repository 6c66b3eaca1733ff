use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};

mod api;
mod brand;
mod bus;
mod chat;
mod concierge;
mod config;
mod error;
mod fixtures;
mod manager;
mod session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Concierge server starting...");

    let config = config::Config::from_env()?;

    let catalog = match &config.fixtures {
        Some(path) => {
            info!("Loading catalog from {}", path.display());
            fixtures::Catalog::load(path).await?
        }
        None => fixtures::Catalog::builtin()?,
    };
    info!(
        "Catalog ready: {} listings, {} intake questions",
        catalog.listings.len(),
        catalog.questions.len()
    );

    let bus = Arc::new(bus::EventBus::new());
    let manager = Arc::new(manager::Manager::new(Arc::new(catalog), bus, &config));

    // Spawn the idle-session reaper in the background
    let manager_clone = manager.clone();
    let reaper_handle = tokio::spawn(async move {
        info!("Starting session reaper...");
        manager_clone.start_reaper().await;
    });

    let app = api::server::router(manager.clone());

    let address = config.bind_address();
    info!("Starting HTTP server on {}", address);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = reaper_handle => {
            error!("Session reaper stopped unexpectedly");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                error!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
