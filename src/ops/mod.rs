//! # Operator processors.
//!
//! Every operator is a small processor: a [`Subscriber`](crate::Subscriber)
//! on its upstream face and, where it has to intercept demand or
//! cancellation, a [`Subscription`](crate::Subscription) on its downstream
//! face. There is no inheritance — chains are built by composing these
//! single-purpose pieces, one per file:
//!
//! - [`map`] / [`filter`] — stateless 1:1 transforms
//! - [`tap`] — peek and the signal-hook family
//! - [`limit`] / [`skip`] — counting operators
//! - [`gate`] — `take_while` / `drop_while` predicate phases
//! - [`distinct`] — equality-based deduplication
//! - [`default_if_empty`] — fallback emission on empty completion
//! - [`resume`] — error/completion fallback switching
//! - [`concat`] — strictly sequential source concatenation
//! - [`flatten`] — bounded-concurrency flatten (the merge engine)
//!
//! [`LiftPublisher`] is the glue: it owns a source and a closure that wraps a
//! downstream subscriber into the operator's upstream subscriber, building a
//! fresh processor per subscription (independent replay).

pub(crate) mod concat;
pub(crate) mod default_if_empty;
pub(crate) mod distinct;
pub(crate) mod filter;
pub(crate) mod flatten;
pub(crate) mod gate;
pub(crate) mod limit;
pub(crate) mod map;
pub(crate) mod resume;
pub(crate) mod skip;
pub(crate) mod tap;

use std::sync::Arc;

use crate::core::{Publisher, Subscriber};
use crate::multi::Multi;

/// Publisher adapter turning a processor-builder closure into an operator.
///
/// Each `subscribe` call runs the builder, producing a fresh processor chain
/// down to the source — the crate-wide independent-replay policy.
pub(crate) struct LiftPublisher<T, R> {
    source: Multi<T>,
    build: Box<dyn Fn(Arc<dyn Subscriber<R>>) -> Arc<dyn Subscriber<T>> + Send + Sync>,
}

impl<T: Send + 'static, R: Send + 'static> LiftPublisher<T, R> {
    pub(crate) fn new(
        source: Multi<T>,
        build: impl Fn(Arc<dyn Subscriber<R>>) -> Arc<dyn Subscriber<T>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            build: Box::new(build),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> Publisher<R> for LiftPublisher<T, R> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<R>>) {
        let upstream_face = (self.build)(subscriber);
        self.source.subscribe(upstream_face);
    }
}
