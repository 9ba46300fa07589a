//! The dispatch cycle.
//!
//! Once per tick the dispatcher snapshots the subscription registry,
//! drains each subscribed topic, and fans the message × subscriber cross
//! product out as concurrent delivery tasks, joining on all of them before
//! returning.
//!
//! Draining is unconditional: a batch is removed from its queue exactly
//! once, whether or not any delivery of it succeeds. Topics without
//! subscribers are never visited, so their queues are left untouched.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::store::{MessageStore, SubscriptionStore};
use crate::webhook::WebhookSender;

/// Cycle-fatal dispatcher errors.
///
/// Individual delivery failures never show up here; they are logged,
/// counted in [`CycleStats`], and dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A delivery task panicked instead of reporting an outcome.
    #[error("delivery task panicked: {0}")]
    DeliveryTask(#[from] tokio::task::JoinError),
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum delivery tasks allowed in flight within one cycle.
    pub max_in_flight: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_in_flight: 256 }
    }
}

/// Counters for one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Topics that yielded at least one message this cycle.
    pub topics_drained: usize,
    /// Messages removed from queues this cycle.
    pub messages_drained: usize,
    /// Delivery units attempted (messages × subscribers).
    pub attempted: usize,
    /// Deliveries answered with HTTP 200.
    pub delivered: usize,
    /// Deliveries that failed for any reason.
    pub failed: usize,
}

/// Orchestrates drain-and-fan-out over the shared stores.
///
/// Stateless between cycles: every invocation starts from a fresh
/// subscription snapshot and a fresh semaphore.
pub struct Dispatcher {
    messages: Arc<MessageStore>,
    subscriptions: Arc<SubscriptionStore>,
    sender: WebhookSender,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration.
    #[must_use]
    pub fn new(
        messages: Arc<MessageStore>,
        subscriptions: Arc<SubscriptionStore>,
        sender: WebhookSender,
    ) -> Self {
        Self::with_config(messages, subscriptions, sender, DispatcherConfig::default())
    }

    /// Create a dispatcher with custom configuration.
    #[must_use]
    pub fn with_config(
        messages: Arc<MessageStore>,
        subscriptions: Arc<SubscriptionStore>,
        sender: WebhookSender,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            messages,
            subscriptions,
            sender,
            config,
        }
    }

    /// Run one dispatch cycle to completion.
    ///
    /// Returns once every delivery task spawned by this cycle has finished,
    /// successfully or not. Delivery tasks hold no store locks; they own
    /// cloned copies of their message and endpoint.
    ///
    /// # Errors
    ///
    /// Fails only if a delivery task panicked. Even then the join barrier
    /// is honored: all remaining tasks finish before the error is returned.
    pub async fn run_cycle(&self) -> Result<CycleStats, DispatchError> {
        let snapshot = self.subscriptions.snapshot();
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut tasks: JoinSet<bool> = JoinSet::new();
        let mut stats = CycleStats::default();

        for (topic, subscribers) in snapshot {
            let Some(batch) = self.messages.drain(&topic) else {
                continue;
            };
            if batch.is_empty() {
                continue;
            }
            stats.topics_drained += 1;
            stats.messages_drained += batch.len();

            for message in batch {
                let message = Arc::new(message);
                for subscription in &subscribers {
                    let semaphore = semaphore.clone();
                    let sender = self.sender.clone();
                    let message = message.clone();
                    let endpoint = subscription.endpoint.clone();
                    let subscription_id = subscription.id.clone();
                    stats.attempted += 1;

                    tasks.spawn(async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .expect("delivery semaphore closed");
                        match sender.deliver(&message, &endpoint).await {
                            Ok(()) => true,
                            Err(err) => {
                                warn!(
                                    endpoint = %endpoint,
                                    subscription = %subscription_id,
                                    message = %message.id,
                                    error = %err,
                                    "Webhook delivery failed"
                                );
                                false
                            }
                        }
                    });
                }
            }
        }

        // Cycle barrier: every spawned task is joined, even if one panics.
        let mut panicked: Option<tokio::task::JoinError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => stats.delivered += 1,
                Ok(false) => stats.failed += 1,
                Err(err) => {
                    if panicked.is_none() {
                        panicked = Some(err);
                    }
                }
            }
        }
        if let Some(err) = panicked {
            return Err(err.into());
        }

        if stats.attempted > 0 {
            debug!(
                topics = stats.topics_drained,
                messages = stats.messages_drained,
                attempted = stats.attempted,
                delivered = stats.delivered,
                failed = stats.failed,
                "Dispatch cycle complete"
            );
        }
        Ok(stats)
    }
}
