//! Concurrent stores for pending messages and subscriptions.
//!
//! Both stores key off the topic name. All mutation happens under the
//! map's per-key shard lock, so a drain can never race a concurrent
//! publish into a lost update: the queue swap and the append are both
//! exclusive for the duration of the entry guard.

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::message::{Message, Subscription};

/// Subscription validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscribeError {
    /// Topic name was empty.
    #[error("topic name cannot be empty")]
    EmptyTopic,

    /// Subscriber endpoint was empty.
    #[error("subscriber endpoint cannot be empty")]
    EmptyEndpoint,
}

/// Buffer of pending messages, keyed by topic.
///
/// Topics are created implicitly on first publish. A drained topic keeps
/// its (now empty) queue in the map; a topic nobody subscribes to keeps
/// accumulating messages until a subscription appears.
#[derive(Debug, Default)]
pub struct MessageStore {
    topics: DashMap<String, Vec<Message>>,
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its topic's queue, creating the topic if new.
    pub fn publish(&self, message: Message) {
        let mut queue = self
            .topics
            .entry(message.topic.clone())
            .or_insert_with(|| {
                debug!(topic = %message.topic, "Created new topic");
                Vec::new()
            });
        queue.push(message);
    }

    /// Atomically take every pending message for a topic.
    ///
    /// The queue is swapped for an empty one under the per-key write lock,
    /// so publishes racing this call land either in the returned batch or
    /// in the fresh queue, never nowhere. Returns `None` for topics that
    /// were never published to.
    ///
    /// Draining is unconditional: the caller is expected to invoke this
    /// only for topics it will actually deliver for.
    pub fn drain(&self, topic: &str) -> Option<Vec<Message>> {
        self.topics
            .get_mut(topic)
            .map(|mut queue| std::mem::take(&mut *queue))
    }

    /// Number of messages pending for a topic.
    #[must_use]
    pub fn pending_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|q| q.len()).unwrap_or(0)
    }

    /// Total pending messages across all topics.
    #[must_use]
    pub fn total_pending(&self) -> usize {
        self.topics.iter().map(|q| q.len()).sum()
    }

    /// Number of topics that have ever been published to.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

/// Registry of subscriber endpoints, keyed by topic.
///
/// Subscriptions accumulate for the process lifetime; there is no removal
/// operation. Duplicates are kept as-is and each receives its own
/// delivery.
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    topics: DashMap<String, Vec<Subscription>>,
}

impl SubscriptionStore {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, creating the topic's list if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic name or endpoint is empty. Endpoints
    /// are otherwise accepted as-is; an unreachable endpoint surfaces as a
    /// delivery failure, not here.
    pub fn subscribe(&self, subscription: Subscription) -> Result<(), SubscribeError> {
        if subscription.topic.is_empty() {
            return Err(SubscribeError::EmptyTopic);
        }
        if subscription.endpoint.is_empty() {
            return Err(SubscribeError::EmptyEndpoint);
        }

        let mut subscribers = self
            .topics
            .entry(subscription.topic.clone())
            .or_insert_with(|| {
                debug!(topic = %subscription.topic, "First subscription for topic");
                Vec::new()
            });
        subscribers.push(subscription);
        Ok(())
    }

    /// Cloned snapshot of a topic's subscribers.
    ///
    /// The clone is taken under the shard lock, so a concurrent subscribe
    /// is never observed mid-iteration.
    #[must_use]
    pub fn get(&self, topic: &str) -> Vec<Subscription> {
        self.topics
            .get(topic)
            .map(|subs| subs.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the whole registry, one `(topic, subscribers)` pair per
    /// subscribed topic. Used once per dispatch cycle.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Vec<Subscription>)> {
        self.topics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of subscribers registered for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Number of topics with at least one subscription.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Total subscriptions across all topics.
    #[must_use]
    pub fn total_subscriptions(&self) -> usize {
        self.topics.iter().map(|subs| subs.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn msg(id: &str, topic: &str) -> Message {
        Message::new(id, topic, serde_json::json!({"n": id}))
    }

    #[test]
    fn test_publish_appends_in_order() {
        let store = MessageStore::new();
        store.publish(msg("1", "t1"));
        store.publish(msg("2", "t1"));

        assert_eq!(store.pending_count("t1"), 2);
        assert_eq!(store.topic_count(), 1);

        let drained = store.drain("t1").unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id, "1");
        assert_eq!(drained[1].id, "2");
    }

    #[test]
    fn test_drain_leaves_empty_queue_in_place() {
        let store = MessageStore::new();
        store.publish(msg("1", "t1"));

        assert_eq!(store.drain("t1").unwrap().len(), 1);
        assert_eq!(store.pending_count("t1"), 0);

        // The topic key survives a drain; a second drain yields an empty
        // batch rather than None.
        assert_eq!(store.topic_count(), 1);
        assert_eq!(store.drain("t1").unwrap().len(), 0);
    }

    #[test]
    fn test_drain_unknown_topic() {
        let store = MessageStore::new();
        assert!(store.drain("nope").is_none());
    }

    #[test]
    fn test_concurrent_publishes_not_lost() {
        let store = Arc::new(MessageStore::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    store.publish(msg(&format!("{worker}-{i}"), "shared"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.pending_count("shared"), 800);
    }

    #[test]
    fn test_publish_drain_race_loses_nothing() {
        let store = Arc::new(MessageStore::new());
        let total = 2_000usize;

        let publisher = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..total {
                    store.publish(msg(&i.to_string(), "t"));
                }
            })
        };

        let drainer = {
            let store = store.clone();
            std::thread::spawn(move || {
                let mut drained = 0usize;
                for _ in 0..50 {
                    if let Some(batch) = store.drain("t") {
                        drained += batch.len();
                    }
                    std::thread::yield_now();
                }
                drained
            })
        };

        publisher.join().unwrap();
        let drained = drainer.join().unwrap();
        let remaining = store.pending_count("t");

        // Every publish landed in exactly one drained batch or is still
        // pending; none were overwritten.
        assert_eq!(drained + remaining, total);
    }

    #[test]
    fn test_subscribe_and_get() {
        let store = SubscriptionStore::new();
        store
            .subscribe(Subscription::new("s1", "http://a/cb", "t1"))
            .unwrap();
        store
            .subscribe(Subscription::new("s2", "http://b/cb", "t1"))
            .unwrap();

        let subs = store.get("t1");
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].id, "s1");
        assert_eq!(store.subscriber_count("t1"), 2);
        assert_eq!(store.total_subscriptions(), 2);
        assert!(store.get("t2").is_empty());
    }

    #[test]
    fn test_duplicate_subscriptions_preserved() {
        let store = SubscriptionStore::new();
        let sub = Subscription::new("s1", "http://a/cb", "t1");
        store.subscribe(sub.clone()).unwrap();
        store.subscribe(sub).unwrap();

        assert_eq!(store.subscriber_count("t1"), 2);
    }

    #[test]
    fn test_subscribe_validation() {
        let store = SubscriptionStore::new();
        assert_eq!(
            store.subscribe(Subscription::new("s1", "http://a/cb", "")),
            Err(SubscribeError::EmptyTopic)
        );
        assert_eq!(
            store.subscribe(Subscription::new("s1", "", "t1")),
            Err(SubscribeError::EmptyEndpoint)
        );
        assert_eq!(store.topic_count(), 0);
    }

    #[test]
    fn test_get_returns_stable_snapshot() {
        let store = SubscriptionStore::new();
        store
            .subscribe(Subscription::new("s1", "http://a/cb", "t1"))
            .unwrap();

        let snapshot = store.get("t1");
        store
            .subscribe(Subscription::new("s2", "http://b/cb", "t1"))
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.get("t1").len(), 2);
    }
}
