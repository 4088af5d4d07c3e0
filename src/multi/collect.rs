//! Accumulating terminal publisher behind `collect` / `collect_list`.
//!
//! Nothing runs until the resulting scalar is subscribed (collection is lazy,
//! unlike `for_each`). On subscribe the collector requests everything from
//! upstream, folds items into the accumulator, and holds the finished value
//! until the downstream asks for it — a scalar is still subject to demand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::{
    trap, Demand, Publisher, Subscriber, Subscription, SubscriptionLink, TerminalLatch,
};
use crate::error::StreamError;
use crate::multi::Multi;

type InitFn<C> = Arc<dyn Fn() -> C + Send + Sync>;
type FoldFn<C, T> = Arc<dyn Fn(&mut C, T) + Send + Sync>;

/// Publisher of the single accumulated value.
pub(crate) struct CollectSource<T, C> {
    source: Multi<T>,
    init: InitFn<C>,
    fold: FoldFn<C, T>,
}

impl<T: Send + 'static, C: Send + 'static> CollectSource<T, C> {
    pub(crate) fn new(source: Multi<T>, init: InitFn<C>, fold: FoldFn<C, T>) -> Self {
        Self { source, init, fold }
    }
}

impl<T: Send + 'static, C: Send + 'static> Publisher<C> for CollectSource<T, C> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<C>>) {
        let accumulator = match trap(|| (self.init)()) {
            Ok(acc) => acc,
            Err(e) => {
                subscriber.on_subscribe(Arc::new(crate::core::TerminatedSubscription));
                subscriber.on_error(e);
                return;
            }
        };
        let collector = Arc::new_cyclic(|me| CollectSubscriber {
            fold: Arc::clone(&self.fold),
            accumulator: Mutex::new(Some(accumulator)),
            finished: Mutex::new(None),
            demand: Demand::new(),
            wip: AtomicUsize::new(0),
            downstream: subscriber,
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
            me: me.clone(),
        });
        self.source
            .subscribe(Arc::clone(&collector) as Arc<dyn Subscriber<T>>);
    }
}

struct CollectSubscriber<T, C> {
    fold: FoldFn<C, T>,
    /// Live accumulator while upstream is running.
    accumulator: Mutex<Option<C>>,
    /// Finished value, parked until downstream demand arrives.
    finished: Mutex<Option<C>>,
    demand: Demand,
    wip: AtomicUsize,
    downstream: Arc<dyn Subscriber<C>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
    me: Weak<Self>,
}

impl<T: Send + 'static, C: Send + 'static> CollectSubscriber<T, C> {
    fn fail(&self, error: StreamError) {
        self.upstream.cancel();
        self.accumulator.lock().take();
        if self.state.error() {
            self.downstream.on_error(error);
        }
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            self.work();
            let previous = self.wip.fetch_sub(missed, Ordering::AcqRel);
            if previous == missed {
                return;
            }
            missed = previous - missed;
        }
    }

    fn work(&self) {
        if self.state.is_terminal() {
            return;
        }
        if self.demand.current() == 0 {
            return;
        }
        let value = self.finished.lock().take();
        if let Some(value) = value {
            self.demand.produced(1);
            self.downstream.on_next(value);
            if self.state.complete() {
                self.downstream.on_complete();
            }
        }
    }
}

impl<T: Send + 'static, C: Send + 'static> Subscriber<T> for CollectSubscriber<T, C> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !self.upstream.set(subscription) {
            return;
        }
        self.state.activate();
        if let Some(me) = self.me.upgrade() {
            self.downstream.on_subscribe(me as Arc<dyn Subscription>);
        }
        self.upstream.request(Demand::UNBOUNDED);
    }

    fn on_next(&self, item: T) {
        if self.state.is_terminal() {
            return;
        }
        let folded = {
            let mut acc = self.accumulator.lock();
            match acc.as_mut() {
                Some(acc) => trap(|| (self.fold)(acc, item)),
                None => return,
            }
        };
        if let Err(e) = folded {
            self.fail(e);
        }
    }

    fn on_error(&self, error: StreamError) {
        self.accumulator.lock().take();
        if self.state.error() {
            self.upstream.clear();
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        if self.state.is_terminal() {
            return;
        }
        self.upstream.clear();
        let value = self.accumulator.lock().take();
        if let Some(value) = value {
            *self.finished.lock() = Some(value);
        }
        self.drain();
    }
}

impl<T: Send + 'static, C: Send + 'static> Subscription for CollectSubscriber<T, C> {
    fn request(&self, n: u64) {
        if self.state.is_terminal() {
            return;
        }
        if n == 0 {
            self.fail(StreamError::protocol("request amount must be positive"));
            return;
        }
        self.demand.add(n);
        self.drain();
    }

    fn cancel(&self) {
        if self.state.cancel() {
            self.upstream.cancel();
            self.accumulator.lock().take();
            self.finished.lock().take();
        }
    }
}
