//! # Core reactive contract.
//!
//! This module provides the building blocks everything else composes:
//! - [`Publisher`] / [`Subscriber`] / [`Subscription`] — the three roles of
//!   the reactive contract
//! - [`Demand`] — the saturating atomic request counter
//! - [`StreamState`] / [`TerminalLatch`] — the absorbing terminal state machine
//! - [`SubscriptionLink`] / [`SubscriptionArbiter`] — upstream-subscription
//!   slots used by operators (crate-internal)
//! - `trap` — the panic trap wrapped around every user callback
//!   (crate-internal)

mod contract;
mod demand;
mod link;
mod state;
mod trap;

pub use contract::{Publisher, Subscriber, Subscription};
pub use demand::Demand;
pub use state::{StreamState, TerminalLatch};

pub(crate) use contract::TerminatedSubscription;
pub(crate) use link::{SubscriptionArbiter, SubscriptionLink};
pub(crate) use trap::trap;
