//! Chatline Server: real-time chat fan-out hub
//!
//! Loads configuration, initializes logging and runs the hub's background
//! loops until a shutdown signal arrives.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use chatline_core::config::AppConfig;
use chatline_core::error::AppError;
use chatline_realtime::{Collaborators, RealtimeEngine};

/// How often the running hub logs its counters.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("CHATLINE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Chatline v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        send_buffer = config.realtime.send_buffer_size,
        broadcast_queue = config.realtime.broadcast_queue_size,
        heartbeat_timeout_secs = config.realtime.heartbeat_timeout_seconds,
        "Hub configuration loaded"
    );

    // Collaborators are wired in by the embedding service; standalone the
    // hub runs with none and reports SERVICE_UNAVAILABLE where they are needed.
    let cancel = CancellationToken::new();
    let engine =
        RealtimeEngine::start_with_token(config.realtime, Collaborators::new(), cancel.clone());

    let mut stats_tick = tokio::time::interval(STATS_INTERVAL);
    stats_tick.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, starting graceful shutdown...");
                break;
            }
            _ = stats_tick.tick() => {
                let stats = engine.stats();
                tracing::info!(
                    connections = stats.total_connections,
                    online_users = stats.online_users,
                    conversations = stats.subscribed_conversations,
                    messages_sent = stats.messages_sent,
                    uptime_secs = stats.uptime_seconds,
                    "Hub stats"
                );
            }
        }
    }

    engine.shutdown().await;
    tracing::info!("Chatline server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
