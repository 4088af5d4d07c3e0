//! # Scalar sequences.
//!
//! [`Single`] narrows the sequence contract to at most one item. It delegates
//! its operator surface to [`Multi`](crate::Multi) and adds scalar-shaped
//! consumers (`Option<T>` results). [`Promise`] is the eager one-shot cell
//! behind `for_each`.

mod promise;
mod single;

pub use single::Single;

pub(crate) use promise::Promise;
