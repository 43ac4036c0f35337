mod config;
mod document;
mod errors;
mod generation;
mod llm_client;
mod models;
mod routes;
mod settings;
mod state;
mod storage;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::settings::ProviderRegistry;
use crate::state::AppState;
use crate::storage::ArtifactStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize artifact store
    let store = ArtifactStore::open(&config.storage_dir)
        .context("Failed to open the artifact store")?;

    // Shared outbound HTTP client. Per-call timeouts are applied by the provider client.
    let http = reqwest::Client::builder()
        .user_agent(concat!("tailor-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build the HTTP client")?;

    // Initialize provider registry (settings file + environment credentials)
    let registry = ProviderRegistry::from_config(&config, http)?;
    let active = registry.get_active_config(None);
    match &active {
        Ok(provider) => info!(
            "Active provider: {} (model: {}, endpoint: {})",
            provider.provider_id, provider.model_name, provider.endpoint
        ),
        Err(e) => tracing::warn!("Active provider is not usable yet: {e}"),
    }

    // Build app state
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::new(registry),
        store,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
