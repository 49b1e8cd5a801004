use anyhow::{Context, Result};
use quicksilver_blog::config::Config;
use quicksilver_blog::rate_limit::spawn_sweeper;
use quicksilver_blog::server::{build_router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quicksilver_blog=info".parse()?),
        )
        .init();

    info!("Starting quicksilver blog server");

    // Load configuration from environment
    let config = Config::from_env()?;
    let addr = config.socket_addr()?;

    let state = AppState::from_config(config)?;
    info!(
        "Loaded {} plugin(s), {} failed to initialize",
        state.plugins.list_loaded().len(),
        state.plugins.failures().len()
    );

    let sweeper = spawn_sweeper(state.rate_limiter.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
