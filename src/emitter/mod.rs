//! # Manual push endpoint with buffering.
//!
//! [`BufferedEmitter`] decouples a producer thread from subscriber demand: a
//! producer calls `emit`/`complete`/`fail` at its own pace, a consumer
//! subscribes later (or never) and drains by demand. Overflow behavior is
//! chosen by [`BufferPolicy`] via [`EmitterConfig`].

mod buffered;
mod config;

pub use buffered::BufferedEmitter;
pub use config::{BufferPolicy, EmitterConfig};

pub(crate) use buffered::CreateSource;
