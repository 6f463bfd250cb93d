//! CivicVerse client - headless live session
//!
//! Connects to the world authority, reads input commands from stdin and
//! logs the reconciled scene and host telemetry.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civicverse_client::app::{spawn_stdin_reader, LogSink, Session};
use civicverse_client::config::Config;
use civicverse_client::util::time::init_client_time;
use civicverse_client::ws::WsConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_client_time();

    info!("Starting CivicVerse client");
    info!("Authority: {}", config.authority_url);
    info!("Telemetry: {}", config.telemetry_url);

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let input = spawn_stdin_reader(input_tx);

    let mut session = Session::start(Arc::new(config), WsConnector, LogSink::default());
    session.run(input_rx, shutdown_signal()).await;

    input.abort();
    info!("Client shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
