//! Core data model for Relay.
//!
//! Messages and subscriptions are created by producers and consumers over
//! the HTTP API and carried through the stores untouched; the broker never
//! inspects a message payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message published to a topic.
///
/// The payload is an opaque JSON value: it is buffered and forwarded
/// without interpretation. On the wire the topic travels as `pattern` and
/// the payload as `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Producer-assigned message identifier.
    pub id: String,
    /// Topic the message belongs to.
    #[serde(rename = "pattern")]
    pub topic: String,
    /// Opaque payload.
    #[serde(rename = "data")]
    pub payload: serde_json::Value,
}

impl Message {
    /// Create a new message.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// A consumer's registration of a callback endpoint for one topic.
///
/// Subscriptions are never deduplicated: registering the same endpoint
/// twice for a topic yields two delivery attempts per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Consumer-assigned subscription identifier.
    pub id: String,
    /// Callback URL messages are POSTed to.
    #[serde(rename = "subscriber_address")]
    pub endpoint: String,
    /// Topic subscribed to.
    #[serde(rename = "topic_name")]
    pub topic: String,
}

impl Subscription {
    /// Create a new subscription.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            topic: topic.into(),
        }
    }
}

/// The JSON wrapper POSTed to a subscriber endpoint.
///
/// One envelope is built per delivery unit; `timestamp` is the delivery
/// construction instant, serialized as RFC3339 UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    /// Topic the message was published to.
    pub event_type: String,
    /// The message being delivered.
    pub event_data: Message,
    /// When this delivery was constructed.
    pub timestamp: DateTime<Utc>,
}

impl DeliveryEnvelope {
    /// Wrap a message for delivery.
    #[must_use]
    pub fn new(message: &Message) -> Self {
        Self {
            event_type: message.topic.clone(),
            event_data: message.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_field_names() {
        let msg = Message::new("m1", "orders", serde_json::json!({"total": 3}));
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["id"], "m1");
        assert_eq!(value["pattern"], "orders");
        assert_eq!(value["data"]["total"], 3);
    }

    #[test]
    fn test_message_roundtrip() {
        let raw = r#"{"id":"7","pattern":"t","data":"hello"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.id, "7");
        assert_eq!(msg.topic, "t");
        assert_eq!(msg.payload, serde_json::json!("hello"));

        let back = serde_json::to_string(&msg).unwrap();
        let reparsed: Message = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed, msg);
    }

    #[test]
    fn test_subscription_wire_field_names() {
        let raw = r#"{"id":"s1","subscriber_address":"http://localhost:9/cb","topic_name":"t"}"#;
        let sub: Subscription = serde_json::from_str(raw).unwrap();
        assert_eq!(sub.id, "s1");
        assert_eq!(sub.endpoint, "http://localhost:9/cb");
        assert_eq!(sub.topic, "t");
    }

    #[test]
    fn test_envelope_shape() {
        let msg = Message::new("1", "evt", serde_json::json!({"k": "v"}));
        let envelope = DeliveryEnvelope::new(&msg);
        assert_eq!(envelope.event_type, "evt");
        assert_eq!(envelope.event_data, msg);

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["event_type"], "evt");
        assert_eq!(value["event_data"]["pattern"], "evt");

        // chrono serializes DateTime<Utc> as RFC3339 with a Z suffix
        let stamp = value["timestamp"].as_str().unwrap();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z') || stamp.contains('+'));
    }
}
