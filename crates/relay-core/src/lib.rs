//! # relay-core
//!
//! Message buffering, subscription registry, and webhook dispatch for the
//! Relay message relay.
//!
//! This crate provides the broker engine:
//!
//! - **MessageStore** - Per-topic buffers of pending messages
//! - **SubscriptionStore** - Per-topic registry of subscriber endpoints
//! - **WebhookSender** - One outbound HTTP delivery per message/subscriber pair
//! - **Dispatcher** - The periodic drain-and-fan-out cycle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────┐
//! │  Publisher  │────▶│ MessageStore │────▶│   Dispatcher  │
//! └─────────────┘     └──────────────┘     └───────┬───────┘
//!                     ┌──────────────────┐         │
//!                     │ SubscriptionStore│◀────────┤
//!                     └──────────────────┘         ▼
//!                                          ┌───────────────┐
//!                                          │ WebhookSender │──▶ subscriber
//!                                          └───────────────┘    endpoints
//! ```
//!
//! Delivery is best-effort and at-most-once: a dispatch cycle drains each
//! subscribed topic unconditionally, so messages whose deliveries all fail
//! are not requeued.

pub mod dispatch;
pub mod message;
pub mod store;
pub mod webhook;

pub use dispatch::{CycleStats, DispatchError, Dispatcher, DispatcherConfig};
pub use message::{DeliveryEnvelope, Message, Subscription};
pub use store::{MessageStore, SubscribeError, SubscriptionStore};
pub use webhook::{DeliveryError, WebhookSender, DEFAULT_DELIVERY_TIMEOUT};
