//! ChatDesk API server

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chatdesk_api::{
    config::Config,
    gateway::{HttpModelGateway, ModelGateway, UnavailableGateway},
    routes::create_router,
    state::AppState,
    store::{ChatStore, MemoryStore, PgStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(config.log_json);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ChatDesk API");

    let store: Arc<dyn ChatStore> = match &config.database_url {
        Some(url) => {
            let pool = chatdesk_shared::create_pool(url, config.database_max_connections)
                .await
                .context("Failed to connect to database")?;
            chatdesk_shared::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Connected to PostgreSQL");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let models: Arc<dyn ModelGateway> = match &config.model_gateway_url {
        Some(url) => {
            tracing::info!(url = %url, "Using model gateway");
            Arc::new(HttpModelGateway::new(
                url.as_str(),
                Duration::from_millis(config.model_request_timeout_ms),
            )?)
        }
        None => {
            tracing::warn!("MODEL_GATEWAY_URL not set, classification and suggestions are disabled");
            Arc::new(UnavailableGateway)
        }
    };

    let bind_address = config.bind_address.clone();
    let (state, classification_worker) = AppState::new(config, store, models);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!(address = %bind_address, "Listening");

    tokio::select! {
        result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()) => {
            result.context("Server error")?;
        }
        result = classification_worker => {
            // The worker only exits on its own if it crashed
            tracing::error!(result = ?result, "Classification worker exited unexpectedly");
            anyhow::bail!("classification worker exited");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatdesk_api=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
