// =============================================================================
// Signal Bridge — Main Entry Point
// =============================================================================
//
// Receives charting-platform webhooks, translates them into a reversal-aware
// order sequence at the venue, and journals every step.
// =============================================================================

mod account;
mod api;
mod app_state;
mod balance_cache;
mod config;
mod error;
mod execution;
mod ingress;
mod journal;
mod precision;
mod store;
mod strategy_registry;
mod symbol_lock;
mod types;
mod uptime;
mod venue;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::Config;
use crate::store::memory::MemoryStore;
use crate::store::mongo::MongoStore;
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("signal bridge starting up");

    let config = Config::from_env().unwrap_or_else(|e| {
        error!(error = %e, "fatal configuration error at startup");
        std::process::exit(1);
    });

    let store: Arc<dyn Store> = match &config.mongo_url {
        Some(url) => {
            info!(db = %config.db_name, "connecting to MongoDB");
            Arc::new(MongoStore::connect(url, &config.db_name).await.unwrap_or_else(|e| {
                error!(error = %e, "fatal: could not connect to MongoDB");
                std::process::exit(1);
            }))
        }
        None => {
            info!("MONGO_URL not set, using in-memory store (state does not survive a restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(&config, store).await.unwrap_or_else(|e| {
        error!(error = %e, "fatal error constructing application state");
        std::process::exit(1);
    }));

    uptime::spawn(state.uptime.clone());

    let bind_addr = config.bind_addr.clone();
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, environment = %config.environment, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("signal bridge shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
}
