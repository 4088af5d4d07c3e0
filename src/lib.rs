//! # multiflow
//!
//! **Multiflow** is a backpressure-aware sequence engine for Rust.
//!
//! It provides demand-driven, push-based sequences — the many-item
//! [`Multi`] and the scalar [`Single`] — over a small subscription
//! contract ([`Publisher`] / [`Subscriber`] / [`Subscription`]), plus the
//! bridges to get results back out: blocking waits and futures.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐
//!   │  IterSource │   │ ConcatSource│   │ BufferedEmitter │
//!   │ (cold items)│   │ (sequenced) │   │  (manual push)  │
//!   └──────┬──────┘   └──────┬──────┘   └────────┬────────┘
//!          ▼                 ▼                   ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Operator chain (built fresh per subscribe)                 │
//! │  map ─ filter ─ peek ─ limit ─ skip ─ distinct ─ resume ─ … │
//! │  flat_map (bounded-concurrency merge coordinator)           │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        ▼                      ▼                       ▼
//!   ┌──────────┐          ┌───────────┐           ┌───────────┐
//!   │ wait()   │          │ to_stage()│           │ for_each()│
//!   │ blocking │          │  Future   │           │   eager   │
//!   └──────────┘          └───────────┘           └───────────┘
//! ```
//!
//! ### Signal flow
//! ```text
//! subscribe(subscriber)
//!   ├─► on_subscribe(subscription)        (exactly once, first)
//!   ├─► subscription.request(n)           (demand, n > 0)
//!   ├─► on_next(item) × m, m ≤ Σn         (never exceeds demand)
//!   └─► on_complete() | on_error(e)       (at most one terminal)
//!
//! subscription.cancel()                    (no further signals; not terminal
//!                                           in the signal sense — nothing is
//!                                           delivered after it)
//! ```
//!
//! ## Features
//! | Area              | Description                                                          | Key types / traits                        |
//! |-------------------|----------------------------------------------------------------------|-------------------------------------------|
//! | **Sequences**     | Compose demand-driven pipelines over many items or one.              | [`Multi`], [`Single`]                      |
//! | **Contract**      | Implement custom sources and consumers.                               | [`Publisher`], [`Subscriber`], [`Subscription`] |
//! | **Emitting**      | Push items from imperative code, with overflow policy.                | [`BufferedEmitter`], [`BufferPolicy`], [`EmitterConfig`] |
//! | **Bridging**      | Leave callback land: block a thread or await a future.                | [`Multi::wait`], [`Stage`]                 |
//! | **Errors**        | One terminal error type across sources, callbacks and protocol.       | [`StreamError`]                            |
//!
//! ## Optional features
//! - `logging`: adds a `log(label)` operator printing every signal to stdout
//!   _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use multiflow::{Multi, StreamError};
//!
//! fn main() -> Result<(), StreamError> {
//!     let words = Multi::just(["orange", "apple", "plum", "kiwi"])
//!         .filter(|w| w.len() > 4)
//!         .map(str::to_uppercase)
//!         .wait()?;
//!     assert_eq!(words, vec!["ORANGE", "APPLE"]);
//!
//!     // scalar view: at most one item, Option-shaped result
//!     let first = Multi::range(1, 100).map(|n| n * n).first().wait()?;
//!     assert_eq!(first, Some(1));
//!     Ok(())
//! }
//! ```

mod bridge;
mod core;
mod emitter;
mod error;
mod multi;
mod ops;
mod single;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use bridge::Stage;
pub use core::{Demand, Publisher, StreamState, Subscriber, Subscription, TerminalLatch};
pub use emitter::{BufferedEmitter, BufferPolicy, EmitterConfig};
pub use error::StreamError;
pub use multi::Multi;
pub use single::Single;
