//! Outbound webhook delivery.
//!
//! One `deliver` call is one delivery unit: envelope construction, JSON
//! serialization, a single HTTP POST, and outcome classification. There is
//! no retry and no state beyond the request/response round trip.

use std::time::Duration;

use reqwest::{header, StatusCode};
use thiserror::Error;
use tracing::trace;

use crate::message::{DeliveryEnvelope, Message};

/// Total per-delivery timeout, covering connect through body read.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a single delivery failed.
///
/// Every variant is local to one delivery unit; none of them propagate
/// past the dispatch cycle that attempted the delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The delivery envelope could not be serialized to JSON.
    #[error("failed to serialize delivery envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The request could not be constructed (e.g. unparseable endpoint URL).
    #[error("failed to build delivery request: {0}")]
    Request(#[source] reqwest::Error),

    /// Connection, TLS, or timeout failure while talking to the endpoint.
    #[error("transport failure delivering webhook: {0}")]
    Transport(#[source] reqwest::Error),

    /// The endpoint answered with anything other than 200.
    #[error("webhook delivery failed: status {0}")]
    Status(StatusCode),
}

/// Sends delivery envelopes to subscriber endpoints.
///
/// Cheap to clone; all clones share one pooled HTTP client.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    /// Create a sender with the default 5-second delivery timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_DELIVERY_TIMEOUT)
    }

    /// Create a sender with a custom total delivery timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build webhook HTTP client");
        Self { client }
    }

    /// Deliver one message to one subscriber endpoint.
    ///
    /// Success is strictly an HTTP 200 response. The response body is read
    /// to completion on every exit path so the connection can be reused.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] classifying the failure; see the enum
    /// docs for the taxonomy.
    pub async fn deliver(&self, message: &Message, endpoint: &str) -> Result<(), DeliveryError> {
        let envelope = DeliveryEnvelope::new(message);
        let body = serde_json::to_vec(&envelope)?;

        let response = self
            .client
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_builder() {
                    DeliveryError::Request(err)
                } else {
                    DeliveryError::Transport(err)
                }
            })?;

        let status = response.status();
        // Drain the body before classifying the status.
        let _ = response.bytes().await;

        if status != StatusCode::OK {
            return Err(DeliveryError::Status(status));
        }

        trace!(endpoint, message = %message.id, "Webhook delivered");
        Ok(())
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}
