use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use reap_client::{AnySink, ChromiumSessionFactory};
use reap_core::{Pipeline, ReapConfig};
use reap_server::routes;
use reap_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reap=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let api_key = std::env::var("REAP_SERVER_API_KEY").ok();
    if api_key.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("REAP_SERVER_API_KEY not set, run endpoint is unauthenticated");
    }
    let port = std::env::var("REAP_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = ReapConfig::from_env().context("Invalid configuration")?;
    let sink = AnySink::from_endpoint(std::env::var("REAP_SINK_URL").ok().as_deref())
        .context("Failed to create sink")?;
    let factory = ChromiumSessionFactory::from_config(&config);
    tracing::info!(
        listing = %config.listing_url,
        remote = config.mode.is_remote(),
        sink = sink.name(),
        "Configured"
    );

    let state = Arc::new(AppState::new(Pipeline::new(config, factory, sink), api_key));
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
