use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vacancy_api::config::Config;
use vacancy_api::profile::CURRENT_SCHEMA_VERSION;
use vacancy_api::routes::build_router;
use vacancy_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("vacancy_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vacancy API v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Profile schema v{CURRENT_SCHEMA_VERSION}, payload limit {} bytes, backfill threshold {} bullet(s)",
        config.max_payload_bytes, config.min_heuristic_bullets
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let app = build_router(AppState::new(config));

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
