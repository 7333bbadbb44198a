//! BrowUser Agent - HTTP server entry point.
//!
//! Starts the agent service: OAuth routes, the task entry point and the
//! observer WebSocket. Run with: cargo run --bin browuser-server

use browuser_agent::{api, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "browuser_agent=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Starting BrowUser agent: planner={} @ {}",
        config.planner_model,
        config.planner_base_url
    );

    api::serve(config).await
}
