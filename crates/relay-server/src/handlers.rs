//! HTTP API for the relay server.
//!
//! Producers POST messages to `/publish`, consumers register callback
//! endpoints via `/subscribe`; the rest of the surface is operational
//! (liveness, readiness, build info).

use crate::config::Config;
use crate::metrics;
use crate::version::BuildInfo;
use anyhow::Result;
use axum::{
    extract::{Json, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use relay_core::{Message, MessageStore, Subscription, SubscriptionStore};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared server state.
pub struct AppState {
    /// Pending message buffers.
    pub messages: Arc<MessageStore>,
    /// Subscriber registry.
    pub subscriptions: Arc<SubscriptionStore>,
    /// Build metadata for the index endpoint.
    pub build: BuildInfo,
    /// Flipped when shutdown begins; drives the readiness probe.
    pub shutting_down: AtomicBool,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(
        messages: Arc<MessageStore>,
        subscriptions: Arc<SubscriptionStore>,
        build: BuildInfo,
    ) -> Self {
        Self {
            messages,
            subscriptions,
            build,
            shutting_down: AtomicBool::new(false),
        }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/publish", post(publish_handler))
        .route("/subscribe", post(subscribe_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// Run the HTTP server until the shutdown token fires, then drain
/// in-flight requests.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn run_server(
    config: &Config,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Relay server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Request-metrics middleware.
async fn track_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    metrics::record_http_request(&path, response.status().as_u16());
    response
}

/// Service banner with build info.
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "message": "Successfully loaded Relay service!",
        "info": state.build.clone(),
    }))
}

/// Accept a message for buffering. Always succeeds for well-formed bodies.
async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Json(message): Json<Message>,
) -> impl IntoResponse {
    debug!(topic = %message.topic, id = %message.id, "Published message");
    state.messages.publish(message.clone());
    metrics::record_publish();

    Json(json!({"message": "message published", "data": message}))
}

/// Register a subscription.
async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    Json(subscription): Json<Subscription>,
) -> impl IntoResponse {
    match state.subscriptions.subscribe(subscription.clone()) {
        Ok(()) => {
            info!(
                topic = %subscription.topic,
                endpoint = %subscription.endpoint,
                "Subscription received"
            );
            metrics::record_subscription();
            (
                StatusCode::OK,
                Json(json!({"message": "subscription processed successfully"})),
            )
        }
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "failed to subscribe", "error": err.to_string()})),
        ),
    }
}

/// Liveness probe.
async fn liveness_handler() -> impl IntoResponse {
    Json(json!({"status": "alive"}))
}

/// Readiness probe; fails once shutdown has begun.
async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.shutting_down.load(Ordering::SeqCst) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "service is shutting down"})),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({"message": "service is ready"})),
        )
    }
}
