//! Political Digest — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.

use political_digest::config::Settings;
use political_digest::metrics::Metrics;
use political_digest::{api, AppState};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("political_digest=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let settings = Settings::from_env();
    let metrics = Metrics::init(settings.cache_ttl_secs());

    let state = AppState::from_settings(&settings);
    let app = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, base_url = %settings.base_url, "political digest listening");
    axum::serve(listener, app).await?;

    Ok(())
}
