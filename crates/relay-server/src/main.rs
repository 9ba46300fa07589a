//! # Relay Server
//!
//! Topic-based webhook relay: producers POST messages to topics, consumers
//! register callback endpoints, and a periodic dispatch cycle pushes
//! buffered messages to every subscriber over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! relayd
//!
//! # Run with a config file in the working directory
//! echo 'port = 9000' > relay.toml && relayd
//!
//! # Run with environment variables
//! RELAY_PORT=8085 RELAY_HOST=0.0.0.0 relayd
//! ```

mod config;
mod handlers;
mod metrics;
mod scheduler;
mod version;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use relay_core::{Dispatcher, DispatcherConfig, MessageStore, SubscriptionStore, WebhookSender};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;
    let build = version::BuildInfo::current();

    tracing::info!(
        release = build.release,
        commit = build.commit,
        "Starting relay server on {}:{}",
        config.host,
        config.port
    );

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    // Broker core
    let messages = Arc::new(MessageStore::new());
    let subscriptions = Arc::new(SubscriptionStore::new());
    let sender = WebhookSender::with_timeout(config.dispatch.delivery_timeout());
    let dispatcher = Dispatcher::with_config(
        messages.clone(),
        subscriptions.clone(),
        sender,
        DispatcherConfig {
            max_in_flight: config.dispatch.max_in_flight,
        },
    );

    // Periodic dispatch
    let dispatch_shutdown = CancellationToken::new();
    let scheduler = tokio::spawn(scheduler::run(
        dispatcher,
        config.dispatch.interval(),
        messages.clone(),
        dispatch_shutdown.clone(),
    ));

    // HTTP API with signal-driven graceful shutdown: flip readiness first,
    // give load balancers the drain window, then stop the listener.
    let state = Arc::new(handlers::AppState::new(messages, subscriptions, build));
    let listener_shutdown = CancellationToken::new();
    {
        let state = state.clone();
        let listener_shutdown = listener_shutdown.clone();
        let drain = config.shutdown.drain();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Received shutdown signal, shutting down..");
            state.shutting_down.store(true, Ordering::SeqCst);
            tokio::time::sleep(drain).await;
            listener_shutdown.cancel();
        });
    }

    handlers::run_server(&config, state, listener_shutdown).await?;

    // Listener is drained; stop issuing new dispatch cycles and let the
    // in-flight one finish its join barrier.
    dispatch_shutdown.cancel();
    scheduler.await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
