//! The multi-valued sequence handle and its operator surface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{self, Stage};
use crate::core::{
    trap, Demand, Publisher, Subscriber, Subscription, SubscriptionLink, TerminalLatch,
};
use crate::emitter::{BufferedEmitter, CreateSource};
use crate::error::StreamError;
use crate::multi::collect::CollectSource;
use crate::multi::sources::{FailedSource, IterFactory, IterSource, NeverSource};
use crate::ops::concat::ConcatSource;
use crate::ops::default_if_empty::DefaultIfEmptyProcessor;
use crate::ops::distinct::DistinctProcessor;
use crate::ops::filter::FilterProcessor;
use crate::ops::flatten::FlattenCoordinator;
use crate::ops::gate::{DropWhileProcessor, TakeWhileProcessor};
use crate::ops::limit::LimitProcessor;
use crate::ops::map::MapProcessor;
use crate::ops::resume::{FallbackFn, ResumeProcessor, ResumeTrigger};
use crate::ops::skip::SkipProcessor;
use crate::ops::tap::{TapHooks, TapProcessor};
use crate::ops::LiftPublisher;
use crate::single::{Promise, Single};

/// Default inner prefetch for the serial flatten shorthands.
const CONCAT_PREFETCH: u64 = 32;

/// A demand-driven sequence of zero or more items.
///
/// `Multi` is a cheap handle over a publisher: cloning it clones the handle,
/// not the stream. Every [`subscribe`](Multi::subscribe) builds a fresh
/// operator chain down to the source, so a `Multi` built from a value factory
/// replays independently to each subscriber.
///
/// Nothing happens until someone subscribes and requests; the blocking and
/// async consumers ([`wait`](Multi::wait), [`to_stage`](Multi::to_stage),
/// [`for_each`](Multi::for_each)) do both for you.
///
/// # Example
/// ```
/// use multiflow::Multi;
///
/// let items = Multi::range(1, 5)
///     .map(|n| n * 10)
///     .filter(|n| n % 20 == 0)
///     .wait()
///     .unwrap();
/// assert_eq!(items, vec![20, 40]);
/// ```
pub struct Multi<T> {
    source: Arc<dyn Publisher<T>>,
}

impl<T> Clone for Multi<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T: Send + 'static> Multi<T> {
    pub(crate) fn wrap(source: Arc<dyn Publisher<T>>) -> Self {
        Self { source }
    }

    /// Wraps an arbitrary publisher.
    pub fn from_publisher(publisher: impl Publisher<T> + 'static) -> Self {
        Self::wrap(Arc::new(publisher))
    }

    /// Subscribes `subscriber`, building a fresh chain down to the source.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        self.source.subscribe(subscriber);
    }

    // ---- Factories ----

    /// Sequence over a fixed set of values, replayed to each subscriber.
    ///
    /// # Example
    /// ```
    /// use multiflow::Multi;
    ///
    /// assert_eq!(Multi::just([1, 2, 3]).wait().unwrap(), vec![1, 2, 3]);
    /// ```
    pub fn just(items: impl IntoIterator<Item = T>) -> Self
    where
        T: Clone + Sync,
    {
        let items: Arc<Vec<T>> = Arc::new(items.into_iter().collect());
        Self::from_factory(Arc::new(move || {
            let items = Arc::clone(&items);
            Box::new((0..items.len()).map(move |i| items[i].clone()))
        }))
    }

    /// Sequence over any cloneable iterable; each subscriber iterates its own
    /// clone.
    pub fn from_iter<I>(iterable: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send,
    {
        Self::from_factory(Arc::new(move || Box::new(iterable.clone().into_iter())))
    }

    /// Completes immediately, without waiting for demand.
    pub fn empty() -> Self {
        Self::from_factory(Arc::new(|| Box::new(std::iter::empty())))
    }

    /// Fails every subscriber with a clone of `error`.
    pub fn error(error: StreamError) -> Self {
        Self::wrap(Arc::new(FailedSource::new(error)))
    }

    /// Never signals anything after the handshake.
    pub fn never() -> Self {
        Self::wrap(Arc::new(NeverSource::new()))
    }

    /// Infinite sequence pulling one value from `supplier` per unit of
    /// demand.
    pub fn generate(supplier: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let supplier: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(supplier);
        Self::from_factory(Arc::new(move || {
            let supplier = Arc::clone(&supplier);
            Box::new(std::iter::repeat_with(move || supplier()))
        }))
    }

    /// Concatenates `sources` strictly in order; a member starts only after
    /// the previous one completed.
    pub fn concat(sources: Vec<Multi<T>>) -> Self {
        Self::wrap(Arc::new(ConcatSource::new(sources)))
    }

    /// Sequence fed by a callback through a fresh [`BufferedEmitter`] per
    /// subscriber.
    pub fn create(callback: impl Fn(BufferedEmitter<T>) + Send + Sync + 'static) -> Self {
        Self::wrap(Arc::new(CreateSource::new(Arc::new(callback))))
    }

    fn from_factory(make: IterFactory<T>) -> Self {
        Self::wrap(Arc::new(IterSource::new(make)))
    }

    // ---- Operators ----

    fn lift<R: Send + 'static>(
        self,
        build: impl Fn(Arc<dyn Subscriber<R>>) -> Arc<dyn Subscriber<T>> + Send + Sync + 'static,
    ) -> Multi<R> {
        Multi::wrap(Arc::new(LiftPublisher::new(self, build)))
    }

    fn tap(self, hooks: TapHooks<T>) -> Multi<T> {
        self.lift(move |down| TapProcessor::create(down, hooks.clone()))
    }

    /// Transforms each item. A panicking mapper fails the sequence.
    pub fn map<R: Send + 'static>(
        self,
        mapper: impl Fn(T) -> R + Send + Sync + 'static,
    ) -> Multi<R> {
        let mapper: Arc<dyn Fn(T) -> R + Send + Sync> = Arc::new(mapper);
        self.lift(move |down| MapProcessor::create(down, Arc::clone(&mapper)))
    }

    /// Keeps only items matching `predicate`.
    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Multi<T> {
        let predicate: Arc<dyn Fn(&T) -> bool + Send + Sync> = Arc::new(predicate);
        self.lift(move |down| FilterProcessor::create(down, Arc::clone(&predicate)))
    }

    /// Observes each item without consuming it.
    pub fn peek(self, hook: impl Fn(&T) + Send + Sync + 'static) -> Multi<T> {
        let mut hooks = TapHooks::none();
        hooks.on_item = Some(Arc::new(hook));
        self.tap(hooks)
    }

    /// Runs `hook` when the sequence fails.
    pub fn on_error_hook(self, hook: impl Fn(&StreamError) + Send + Sync + 'static) -> Multi<T> {
        let mut hooks = TapHooks::none();
        hooks.on_error = Some(Arc::new(hook));
        self.tap(hooks)
    }

    /// Runs `hook` right before the completion signal.
    pub fn on_complete_hook(self, hook: impl Fn() + Send + Sync + 'static) -> Multi<T> {
        let mut hooks = TapHooks::none();
        hooks.on_complete = Some(Arc::new(hook));
        self.tap(hooks)
    }

    /// Runs `hook` on any end of the sequence: completion, error or cancel.
    pub fn on_terminate(self, hook: impl Fn() + Send + Sync + 'static) -> Multi<T> {
        let mut hooks = TapHooks::none();
        hooks.on_terminate = Some(Arc::new(hook));
        self.tap(hooks)
    }

    /// Runs `hook` on the first downstream cancellation.
    pub fn on_cancel(self, hook: impl Fn() + Send + Sync + 'static) -> Multi<T> {
        let mut hooks = TapHooks::none();
        hooks.on_cancel = Some(Arc::new(hook));
        self.tap(hooks)
    }

    /// Observes every demand request travelling upstream.
    pub fn on_request(self, hook: impl Fn(u64) + Send + Sync + 'static) -> Multi<T> {
        let mut hooks = TapHooks::none();
        hooks.on_request = Some(Arc::new(hook));
        self.tap(hooks)
    }

    /// Emits at most `n` items, then cancels upstream and completes.
    /// `limit(0)` completes immediately.
    pub fn limit(self, n: u64) -> Multi<T> {
        self.lift(move |down| LimitProcessor::create(down, n))
    }

    /// Drops the first `n` items.
    pub fn skip(self, n: u64) -> Multi<T> {
        self.lift(move |down| SkipProcessor::create(down, n))
    }

    /// Emits items while `predicate` holds; the first failing item is
    /// dropped and the sequence completes.
    pub fn take_while(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Multi<T> {
        let predicate: Arc<dyn Fn(&T) -> bool + Send + Sync> = Arc::new(predicate);
        self.lift(move |down| TakeWhileProcessor::create(down, Arc::clone(&predicate)))
    }

    /// Drops items while `predicate` holds, then lets everything through.
    pub fn drop_while(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Multi<T> {
        let predicate: Arc<dyn Fn(&T) -> bool + Send + Sync> = Arc::new(predicate);
        self.lift(move |down| DropWhileProcessor::create(down, Arc::clone(&predicate)))
    }

    /// Suppresses items already seen, by equality. State is per subscription.
    pub fn distinct(self) -> Multi<T>
    where
        T: Clone + Eq + std::hash::Hash,
    {
        self.lift(|down| DistinctProcessor::create(down))
    }

    /// Emits `value` when the sequence completes without a single item.
    pub fn default_if_empty(self, value: T) -> Multi<T>
    where
        T: Clone + Sync,
    {
        self.default_if_empty_with(move || value.clone())
    }

    /// Like [`default_if_empty`](Multi::default_if_empty), computing the
    /// fallback lazily.
    pub fn default_if_empty_with(self, supplier: impl Fn() -> T + Send + Sync + 'static) -> Multi<T> {
        let supplier: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(supplier);
        self.lift(move |down| DefaultIfEmptyProcessor::create(down, Arc::clone(&supplier)))
    }

    /// Replaces an upstream error with one item computed from it.
    pub fn on_error_resume(self, mapper: impl Fn(&StreamError) -> T + Send + Sync + 'static) -> Multi<T>
    where
        T: Clone + Sync,
    {
        self.on_error_resume_with(move |e| Multi::just([mapper(e)]))
    }

    /// Switches to a fallback sequence when upstream errors. The fallback
    /// runs at most once; its own failure propagates.
    pub fn on_error_resume_with(
        self,
        fallback: impl Fn(&StreamError) -> Multi<T> + Send + Sync + 'static,
    ) -> Multi<T> {
        let fallback: FallbackFn<T> = Arc::new(move |error| match error {
            Some(e) => fallback(e),
            None => Multi::empty(),
        });
        self.lift(move |down| {
            ResumeProcessor::create(down, ResumeTrigger::OnError, Arc::clone(&fallback))
        })
    }

    /// Appends one item after a normal completion.
    pub fn on_complete_resume(self, value: T) -> Multi<T>
    where
        T: Clone + Sync,
    {
        self.on_complete_resume_with(Multi::just([value]))
    }

    /// Appends a whole sequence after a normal completion. Errors pass
    /// through untouched.
    pub fn on_complete_resume_with(self, fallback: Multi<T>) -> Multi<T> {
        let fallback: FallbackFn<T> = Arc::new(move |_| fallback.clone());
        self.lift(move |down| {
            ResumeProcessor::create(down, ResumeTrigger::OnComplete, Arc::clone(&fallback))
        })
    }

    /// Maps each item to an inner sequence and merges up to `max_concurrent`
    /// of them.
    ///
    /// Items of one inner keep their order; interleaving across inners is
    /// unspecified. With `delay_errors` the first inner/mapper error is
    /// parked until every remaining inner finished; without it the error
    /// cancels everything immediately. `prefetch` bounds the demand issued to
    /// each inner.
    ///
    /// # Example
    /// ```
    /// use multiflow::Multi;
    ///
    /// let mut items = Multi::range(0, 3)
    ///     .flat_map(|n| Multi::range(n * 10, 2), 2, false, 8)
    ///     .wait()
    ///     .unwrap();
    /// items.sort_unstable();
    /// assert_eq!(items, vec![0, 1, 10, 11, 20, 21]);
    /// ```
    pub fn flat_map<R: Send + 'static>(
        self,
        mapper: impl Fn(T) -> Multi<R> + Send + Sync + 'static,
        max_concurrent: u64,
        delay_errors: bool,
        prefetch: u64,
    ) -> Multi<R> {
        let mapper: Arc<dyn Fn(T) -> Multi<R> + Send + Sync> = Arc::new(mapper);
        self.lift(move |down| {
            FlattenCoordinator::create(
                down,
                Arc::clone(&mapper),
                max_concurrent,
                delay_errors,
                prefetch,
            )
        })
    }

    /// Serial flatten: inners run one at a time, in upstream order.
    pub fn concat_map<R: Send + 'static>(
        self,
        mapper: impl Fn(T) -> Multi<R> + Send + Sync + 'static,
    ) -> Multi<R> {
        self.flat_map(mapper, 1, false, CONCAT_PREFETCH)
    }

    /// Expands each item into an iterable, keeping overall order.
    pub fn flat_map_iter<R, I>(self, mapper: impl Fn(T) -> I + Send + Sync + 'static) -> Multi<R>
    where
        R: Send + 'static,
        I: IntoIterator<Item = R> + Clone + Send + Sync + 'static,
        I::IntoIter: Send,
    {
        self.flat_map(
            move |item| Multi::from_iter(mapper(item)),
            1,
            false,
            CONCAT_PREFETCH,
        )
    }

    /// Prints every signal to stdout, prefixed with `label`. Demo tooling.
    #[cfg(feature = "logging")]
    pub fn log(self, label: impl Into<String>) -> Multi<T>
    where
        T: std::fmt::Debug,
    {
        let label = Arc::new(label.into());
        let mut hooks = TapHooks::none();
        hooks.on_item = Some(Arc::new({
            let label = Arc::clone(&label);
            move |item: &T| println!("[{label}] item={item:?}")
        }));
        hooks.on_error = Some(Arc::new({
            let label = Arc::clone(&label);
            move |e: &StreamError| println!("[{label}] error={:?}", e.as_message())
        }));
        hooks.on_complete = Some(Arc::new({
            let label = Arc::clone(&label);
            move || println!("[{label}] complete")
        }));
        hooks.on_cancel = Some(Arc::new({
            let label = Arc::clone(&label);
            move || println!("[{label}] cancel")
        }));
        hooks.on_request = Some(Arc::new(move |n: u64| println!("[{label}] request n={n}")));
        self.tap(hooks)
    }

    // ---- Consumers ----

    /// Runs `consumer` for every item, starting the sequence immediately
    /// with unbounded demand.
    ///
    /// Returns a [`Single`] that completes when the sequence does; a
    /// panicking consumer cancels upstream and fails it.
    pub fn for_each(self, consumer: impl Fn(T) + Send + Sync + 'static) -> Single<()> {
        let promise = Arc::new(Promise::new());
        let subscriber = Arc::new(ForEachSubscriber {
            consumer: Arc::new(consumer),
            promise: Arc::clone(&promise),
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
        });
        self.subscribe(subscriber as Arc<dyn Subscriber<T>>);
        Single::from_multi(Multi::wrap(promise as Arc<dyn Publisher<()>>))
    }

    /// Folds all items into an accumulator. Lazy: nothing runs until the
    /// resulting [`Single`] is subscribed.
    pub fn collect<C: Send + 'static>(
        self,
        init: impl Fn() -> C + Send + Sync + 'static,
        fold: impl Fn(&mut C, T) + Send + Sync + 'static,
    ) -> Single<C> {
        Single::from_multi(Multi::wrap(Arc::new(CollectSource::new(
            self,
            Arc::new(init),
            Arc::new(fold),
        ))))
    }

    /// Collects all items into a `Vec`.
    pub fn collect_list(self) -> Single<Vec<T>> {
        self.collect(Vec::new, |list, item| list.push(item))
    }

    /// Collects all items into a `VecDeque`.
    pub fn collect_deque(self) -> Single<VecDeque<T>> {
        self.collect(VecDeque::new, |deque, item| deque.push_back(item))
    }

    /// The first item, cancelling upstream once it arrived.
    pub fn first(self) -> Single<T> {
        Single::from_multi(self.limit(1))
    }

    /// Blocks the calling thread until the sequence terminates.
    pub fn wait(self) -> Result<Vec<T>, StreamError> {
        bridge::wait(&self)
    }

    /// Like [`wait`](Multi::wait), but gives up (and cancels) after
    /// `timeout`, returning [`StreamError::AwaitTimeout`].
    pub fn wait_timeout(self, timeout: Duration) -> Result<Vec<T>, StreamError> {
        bridge::wait_timeout(&self, timeout)
    }

    /// Future resolving with all items once the sequence terminates.
    pub fn to_stage(self) -> Stage<Vec<T>> {
        bridge::stage_with(&self, |items| items)
    }
}

impl Multi<i64> {
    /// `count` consecutive integers starting at `from`.
    ///
    /// # Example
    /// ```
    /// use multiflow::Multi;
    ///
    /// assert_eq!(Multi::range(3, 4).wait().unwrap(), vec![3, 4, 5, 6]);
    /// ```
    pub fn range(from: i64, count: u64) -> Multi<i64> {
        Self::from_factory(Arc::new(move || {
            Box::new((0..count).map(move |i| from + i as i64))
        }))
    }
}

/// Eager unbounded consumer feeding a [`Promise`].
struct ForEachSubscriber<T> {
    consumer: Arc<dyn Fn(T) + Send + Sync>,
    promise: Arc<Promise<()>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
}

impl<T: Send + 'static> Subscriber<T> for ForEachSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !self.upstream.set(subscription) {
            return;
        }
        self.state.activate();
        self.upstream.request(Demand::UNBOUNDED);
    }

    fn on_next(&self, item: T) {
        if self.state.is_terminal() {
            return;
        }
        if let Err(e) = trap(|| (self.consumer)(item)) {
            self.upstream.cancel();
            if self.state.error() {
                self.promise.resolve(Err(e));
            }
        }
    }

    fn on_error(&self, error: StreamError) {
        if self.state.error() {
            self.upstream.clear();
            self.promise.resolve(Err(error));
        }
    }

    fn on_complete(&self) {
        if self.state.complete() {
            self.upstream.clear();
            self.promise.resolve(Ok(None));
        }
    }
}
