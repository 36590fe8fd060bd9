mod backend;
mod config;
mod errors;
mod invitations;
mod models;
mod routes;
mod state;
mod swipe;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::http::HttpBackend;
use crate::backend::memory::{InMemoryBackend, Seed};
use crate::backend::MatchBackend;
use crate::config::Config;
use crate::routes::{build_router, cors_layer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting matchdeck v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the recruiting backend client
    let backend: Arc<dyn MatchBackend> = match &config.backend_url {
        Some(url) => {
            let client = HttpBackend::new(
                url.clone(),
                config.backend_token.clone(),
                config.backend_timeout,
            )?;
            info!("Backend client initialized ({url})");
            Arc::new(client)
        }
        None => {
            warn!("BACKEND_URL not set; running against the in-memory backend");
            let memory = InMemoryBackend::new(config.invitation_ttl_days);
            if let Some(path) = &config.seed_path {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read seed file {path}"))?;
                let seed: Seed = serde_json::from_str(&raw)
                    .with_context(|| format!("seed file {path} is not valid JSON"))?;
                memory.load_seed(seed).await;
            }
            Arc::new(memory)
        }
    };

    info!(
        "Settle delay {}ms, recommendation limit {}",
        config.settle_delay.as_millis(),
        config.recommendation_limit
    );

    let state = AppState::new(config.clone(), backend);
    let _reaper = state.sessions.spawn_reaper(config.session_idle_ttl);

    if config.cors_allowed_origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set; allowing any origin");
    }

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
