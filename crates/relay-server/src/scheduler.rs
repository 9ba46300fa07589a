//! Periodic driver for the dispatch cycle.
//!
//! Cycles are serialized: `run_cycle` is awaited inside the tick arm, so a
//! cycle that overruns the period delays the next tick instead of running
//! concurrently with it. On cancellation the loop exits after the
//! in-flight cycle (if any) has finished its join barrier.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{Dispatcher, MessageStore};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::metrics;

/// Tick the dispatcher until the shutdown token fires.
pub async fn run(
    dispatcher: Dispatcher,
    period: Duration,
    messages: Arc<MessageStore>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_ms = period.as_millis() as u64, "Dispatch scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let started = Instant::now();
                match dispatcher.run_cycle().await {
                    Ok(stats) => {
                        metrics::record_cycle(&stats, started.elapsed());
                        metrics::set_messages_pending(messages.total_pending());
                    }
                    Err(err) => {
                        // Fatal to this cycle only; the next tick starts fresh.
                        error!(error = %err, "Dispatch cycle failed");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("Dispatch scheduler stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_core::{Message, SubscriptionStore, WebhookSender};

    use super::*;

    fn scheduler_parts() -> (Arc<MessageStore>, Dispatcher) {
        let messages = Arc::new(MessageStore::new());
        let subscriptions = Arc::new(SubscriptionStore::new());
        let dispatcher = Dispatcher::new(
            messages.clone(),
            subscriptions,
            WebhookSender::new(),
        );
        (messages, dispatcher)
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_cancel() {
        let (messages, dispatcher) = scheduler_parts();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run(
            dispatcher,
            Duration::from_millis(10),
            messages,
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_orphan_messages_survive_ticks() {
        let (messages, dispatcher) = scheduler_parts();
        let shutdown = CancellationToken::new();

        messages.publish(Message::new("1", "orphan", serde_json::json!("x")));

        let handle = tokio::spawn(run(
            dispatcher,
            Duration::from_millis(5),
            messages.clone(),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        // Many cycles ran; the unsubscribed topic was never drained.
        assert_eq!(messages.pending_count("orphan"), 1);
    }
}
