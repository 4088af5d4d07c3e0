//! # Multi-valued sequences.
//!
//! [`Multi`] is the many-item half of the API: factories build cold sources
//! (iterator-backed, failed, silent), the operator surface composes
//! processors from [`crate::ops`], and the consumer methods hand off to the
//! collectors and bridges.

mod collect;
mod multi;
mod sources;

pub use multi::Multi;
