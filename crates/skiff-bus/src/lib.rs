//! # skiff-bus
//!
//! In-process publish/subscribe keyed by string topics.
//!
//! - `publish` is synchronous and delivers in publish order per topic
//! - each topic keeps its last N payloads so late subscribers can ask for replay
//! - `once` subscriptions remove themselves after their first delivery,
//!   including a replayed one
//! - handlers run outside the bus lock and may publish or subscribe re-entrantly
//! - a panicking handler is logged and does not stop delivery to the others
//!
//! [`EventBus::merge`] builds a bus that sees everything published on its
//! inputs; it is used for telemetry taps.

#![deny(unsafe_code)]

mod bus;

pub use bus::{DEFAULT_REPLAY_DEPTH, EventBus, Handler, Observer, SubscribeOptions, SubscriptionId};
