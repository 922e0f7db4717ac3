//! Pocketbook Binary
//!
//! Loads configuration, warms the exchange rate cache and keeps the ledger
//! and converter running until interrupted.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pocketbook_server::{App, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Pocketbook");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("{}", e));
    }

    let app = Arc::new(App::new(config));
    app.start().await?;

    for resolved in app.rate_matrix().await {
        if !resolved.pair.is_identity() {
            info!(
                pair = %resolved.pair,
                rate = resolved.rate,
                tier = %resolved.tier,
                "Exchange rate"
            );
        }
    }

    let shutdown_app = app.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Shutdown signal received");
        if let Err(e) = shutdown_app.stop().await {
            error!(error = %e, "Error during shutdown");
        }
    });

    while !app.state().is_terminal() {
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }

    info!("Pocketbook shutdown complete");
    Ok(())
}
