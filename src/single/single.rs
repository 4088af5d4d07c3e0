//! The scalar sequence handle.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{self, Stage};
use crate::core::{Publisher, Subscriber};
use crate::error::StreamError;
use crate::multi::Multi;

/// A sequence of at most one item.
///
/// `Single` is a thin view over [`Multi`] with the one-item invariant held by
/// construction: every factory and operator here yields at most one item.
/// The consumers reflect that — [`wait`](Single::wait) resolves to
/// `Option<T>`, `None` meaning an empty completion.
///
/// # Example
/// ```
/// use multiflow::Single;
///
/// let value = Single::just(21).map(|n| n * 2).wait().unwrap();
/// assert_eq!(value, Some(42));
/// ```
pub struct Single<T> {
    source: Multi<T>,
}

impl<T> Clone for Single<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: Send + 'static> Single<T> {
    /// Wraps a `Multi` already known to emit at most one item.
    pub(crate) fn from_multi(source: Multi<T>) -> Self {
        Self { source }
    }

    /// Scalar holding one value, replayed to each subscriber.
    pub fn just(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_multi(Multi::just([value]))
    }

    /// Completes empty, without waiting for demand.
    pub fn empty() -> Self {
        Self::from_multi(Multi::empty())
    }

    /// Fails every subscriber with a clone of `error`.
    pub fn error(error: StreamError) -> Self {
        Self::from_multi(Multi::error(error))
    }

    /// Never signals anything after the handshake.
    pub fn never() -> Self {
        Self::from_multi(Multi::never())
    }

    /// Adapts an arbitrary publisher, taking its first item only.
    pub fn from_publisher(publisher: impl Publisher<T> + 'static) -> Self {
        Self::from_multi(Multi::from_publisher(publisher).limit(1))
    }

    /// Subscribes `subscriber` to the underlying sequence.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        self.source.subscribe(subscriber);
    }

    /// Widens back to a [`Multi`].
    pub fn to_multi(self) -> Multi<T> {
        self.source
    }

    // ---- Operators ----

    /// Transforms the item, if there is one.
    pub fn map<R: Send + 'static>(
        self,
        mapper: impl Fn(T) -> R + Send + Sync + 'static,
    ) -> Single<R> {
        Single::from_multi(self.source.map(mapper))
    }

    /// Keeps the item only when `predicate` holds; otherwise completes empty.
    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Single<T> {
        Single::from_multi(self.source.filter(predicate))
    }

    /// Observes the item without consuming it.
    pub fn peek(self, hook: impl Fn(&T) + Send + Sync + 'static) -> Single<T> {
        Single::from_multi(self.source.peek(hook))
    }

    /// Runs `hook` when the scalar fails.
    pub fn on_error_hook(self, hook: impl Fn(&StreamError) + Send + Sync + 'static) -> Single<T> {
        Single::from_multi(self.source.on_error_hook(hook))
    }

    /// Runs `hook` on any end of the scalar: completion, error or cancel.
    pub fn on_terminate(self, hook: impl Fn() + Send + Sync + 'static) -> Single<T> {
        Single::from_multi(self.source.on_terminate(hook))
    }

    /// Replaces an empty completion with `value`.
    pub fn default_if_empty(self, value: T) -> Single<T>
    where
        T: Clone + Sync,
    {
        Single::from_multi(self.source.default_if_empty(value))
    }

    /// Replaces an error with one value computed from it.
    pub fn on_error_resume(
        self,
        mapper: impl Fn(&StreamError) -> T + Send + Sync + 'static,
    ) -> Single<T>
    where
        T: Clone + Sync,
    {
        Single::from_multi(self.source.on_error_resume(mapper))
    }

    /// Switches to a fallback scalar when this one errors.
    pub fn on_error_resume_with(
        self,
        fallback: impl Fn(&StreamError) -> Single<T> + Send + Sync + 'static,
    ) -> Single<T> {
        Single::from_multi(
            self.source
                .on_error_resume_with(move |e| fallback(e).to_multi()),
        )
    }

    /// Maps the item to a whole sequence.
    pub fn flat_map<R: Send + 'static>(
        self,
        mapper: impl Fn(T) -> Multi<R> + Send + Sync + 'static,
    ) -> Multi<R> {
        self.source.concat_map(mapper)
    }

    /// Maps the item to another scalar.
    pub fn flat_map_single<R: Send + 'static>(
        self,
        mapper: impl Fn(T) -> Single<R> + Send + Sync + 'static,
    ) -> Single<R> {
        Single::from_multi(self.source.concat_map(move |item| mapper(item).to_multi()))
    }

    // ---- Consumers ----

    /// Blocks until the scalar terminates. `Ok(None)` is an empty completion.
    pub fn wait(self) -> Result<Option<T>, StreamError> {
        bridge::wait(&self.source).map(first_of)
    }

    /// Like [`wait`](Single::wait), but gives up (and cancels) after
    /// `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Option<T>, StreamError> {
        bridge::wait_timeout(&self.source, timeout).map(first_of)
    }

    /// Future resolving with the item (or `None`) once the scalar
    /// terminates.
    pub fn to_stage(self) -> Stage<Option<T>> {
        bridge::stage_with(&self.source, first_of)
    }
}

fn first_of<T>(items: Vec<T>) -> Option<T> {
    items.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Recorder;

    #[test]
    fn test_just_carries_one_value() {
        assert_eq!(Single::just(5).wait().expect("must complete"), Some(5));
    }

    #[test]
    fn test_empty_completes_with_none() {
        assert_eq!(Single::<i64>::empty().wait().expect("must complete"), None);
    }

    #[test]
    fn test_map_and_filter_compose() {
        let kept = Single::just(4).map(|n| n * 2).filter(|n| *n > 5).wait();
        assert_eq!(kept.expect("must complete"), Some(8));

        let dropped = Single::just(1).filter(|n| *n > 5).wait();
        assert_eq!(dropped.expect("must complete"), None);
    }

    #[test]
    fn test_from_publisher_takes_first_item_only() {
        struct Counter;
        impl Publisher<i64> for Counter {
            fn subscribe(&self, subscriber: Arc<dyn Subscriber<i64>>) {
                Multi::range(1, 100).subscribe(subscriber);
            }
        }
        let value = Single::from_publisher(Counter).wait();
        assert_eq!(value.expect("must complete"), Some(1));
    }

    #[test]
    fn test_error_propagates() {
        let result = Single::<i64>::error(StreamError::message("boom")).wait();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_if_empty_fills_the_gap() {
        let value = Single::<i64>::empty().default_if_empty(7).wait();
        assert_eq!(value.expect("must complete"), Some(7));
    }

    #[test]
    fn test_on_error_resume_recovers() {
        let value = Single::<i64>::error(StreamError::message("boom"))
            .on_error_resume(|_| -1)
            .wait();
        assert_eq!(value.expect("must complete"), Some(-1));
    }

    #[test]
    fn test_flat_map_widens_to_multi() {
        let items = Single::just(3i64)
            .flat_map(|n| Multi::range(n, 3))
            .wait()
            .expect("must complete");
        assert_eq!(items, vec![3, 4, 5]);
    }

    #[test]
    fn test_flat_map_single_stays_scalar() {
        let value = Single::just(2)
            .flat_map_single(|n| Single::just(n * 10))
            .wait();
        assert_eq!(value.expect("must complete"), Some(20));
    }

    #[test]
    fn test_wait_timeout_expires_on_silence() {
        let result = Single::<i64>::never().wait_timeout(Duration::from_millis(20));
        assert!(result.expect_err("must time out").is_timeout());
    }

    #[test]
    fn test_subscribe_delivers_value_and_completion() {
        let recorder = Recorder::unbounded();
        Single::just(9).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![9]);
        assert!(recorder.completed());
    }

    #[tokio::test]
    async fn test_stage_resolves_with_option() {
        assert_eq!(
            Single::just(1).to_stage().await.expect("must complete"),
            Some(1)
        );
        assert_eq!(
            Single::<i64>::empty()
                .to_stage()
                .await
                .expect("must complete"),
            None
        );
    }
}
