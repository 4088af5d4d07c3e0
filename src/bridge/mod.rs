//! # Bridges out of the subscription world.
//!
//! Two ways to leave callback land:
//!
//! - [`wait`] / [`wait_timeout`] — block the calling thread until the
//!   sequence terminates (condvar rendezvous);
//! - [`Stage`] — a `Future` resolving with the terminal outcome, for async
//!   callers.
//!
//! Both attach with unbounded demand; backpressure is the operator chain's
//! job by the time a bridge is the consumer.

mod stage;
mod wait;

pub use stage::Stage;

pub(crate) use stage::stage_with;
pub(crate) use wait::{wait, wait_timeout};
