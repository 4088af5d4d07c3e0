//! # The three roles of the reactive contract.
//!
//! [`Publisher`] produces items only in response to requested demand,
//! [`Subscriber`] consumes items plus exactly one terminal signal, and
//! [`Subscription`] is the live handle between one publisher and one
//! subscriber, carrying demand and cancellation.
//!
//! ## Rules
//! - No signals before `subscribe`; sequences are cold.
//! - Per subscription, signals are serial: no two threads call the same
//!   subscriber's `on_next` concurrently. Operators that bridge producer
//!   threads serialize internally.
//! - At most one terminal signal (`on_complete` **or** `on_error`) is ever
//!   delivered; terminal states are absorbing.
//! - `request(0)` is a protocol violation and terminates the subscription
//!   with [`StreamError::Protocol`](crate::StreamError::Protocol). Demand is
//!   unsigned, so the classic "non-positive request" rule degenerates to the
//!   zero case.
//! - `cancel` is idempotent and safe from any thread; after it, no further
//!   items are delivered.

use std::sync::Arc;

use crate::error::StreamError;

/// Demand and cancellation handle between one publisher and one subscriber.
pub trait Subscription: Send + Sync {
    /// Requests `n` more items from the publisher.
    ///
    /// Demand is cumulative with saturating arithmetic; requesting
    /// [`Demand::UNBOUNDED`](crate::Demand::UNBOUNDED) switches the
    /// subscription to unbounded mode. `request(0)` terminates the
    /// subscription with a protocol error. Requests after cancellation are
    /// no-ops.
    fn request(&self, n: u64);

    /// Cancels the subscription.
    ///
    /// Idempotent; propagates upstream eagerly and exactly once. After the
    /// first call no further items reach the subscriber.
    fn cancel(&self);
}

/// Sink receiving items, then exactly one terminal signal.
///
/// Methods take `&self`: implementations use interior mutability, which lets
/// a single `Arc<dyn Subscriber<T>>` be driven from whatever thread the
/// producer runs on.
pub trait Subscriber<T>: Send + Sync {
    /// Called exactly once, before any other signal, with the live handle.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// Called once per item, never exceeding the requested demand.
    fn on_next(&self, item: T);

    /// Terminal failure signal. No signal follows.
    fn on_error(&self, error: StreamError);

    /// Terminal completion signal. No signal follows.
    fn on_complete(&self);
}

/// Source of items that emits only in response to requested demand.
pub trait Publisher<T>: Send + Sync {
    /// Attaches `subscriber` to this publisher.
    ///
    /// Every call builds an independent subscription: subscribing twice to
    /// the same publisher replays the logical data to each subscriber (the
    /// single-subscriber [`BufferedEmitter`](crate::BufferedEmitter) is the
    /// documented exception).
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// Subscription handed out alongside an immediate terminal signal.
///
/// Requests and cancels are ignored; the sequence is already over.
pub(crate) struct TerminatedSubscription;

impl Subscription for TerminatedSubscription {
    fn request(&self, _n: u64) {}
    fn cancel(&self) {}
}
