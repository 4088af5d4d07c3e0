//! Bounded-concurrency flatten (`flat_map`).
//!
//! The coordinator subscribes to at most `max_concurrent` inner sequences at
//! a time, granting each a fixed `prefetch` budget. Inner items land in a
//! shared ready queue; a wip-serialized drain loop moves them downstream
//! under downstream demand and replenishes the producing inner with
//! `request(1)` per delivered item — an inner is never granted more than
//! `prefetch` outstanding.
//!
//! ## Ordering
//! - Items from the same inner stay in that inner's emission order.
//! - `max_concurrent == 1` degenerates to concat-map: strict upstream order.
//! - Otherwise items from different inners interleave by completion timing;
//!   that interleaving is the contract, not a defect.
//!
//! ## Errors
//! - `delay_errors == false`: the first error (upstream, mapper, or inner)
//!   wins, cancels upstream and every sibling, discards the queue, and is
//!   surfaced immediately.
//! - `delay_errors == true`: the first error is parked; untouched sources run
//!   to completion and the error is surfaced only after all of them finish.
//! - a downstream `request(0)` terminates the stream immediately in both
//!   modes, cancelling upstream and every inner.
//!
//! Completion requires upstream exhaustion, every spawned inner reaching its
//! own terminal state, and the ready queue draining empty.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::{trap, Demand, Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;
use crate::multi::Multi;

pub(crate) struct FlattenCoordinator<T, R> {
    mapper: Arc<dyn Fn(T) -> Multi<R> + Send + Sync>,
    max_concurrent: u64,
    prefetch: u64,
    delay_errors: bool,
    downstream: Arc<dyn Subscriber<R>>,
    demand: Demand,
    state: TerminalLatch,
    upstream: Arc<SubscriptionLink>,
    upstream_done: AtomicBool,
    active: AtomicUsize,
    ready: Mutex<VecDeque<(R, Arc<InnerSubscriber<T, R>>)>>,
    inners: Mutex<Vec<Arc<InnerSubscriber<T, R>>>>,
    error: Mutex<Option<StreamError>>,
    abort: AtomicBool,
    wip: AtomicUsize,
    me: Weak<Self>,
}

impl<T: Send + 'static, R: Send + 'static> FlattenCoordinator<T, R> {
    pub(crate) fn create(
        downstream: Arc<dyn Subscriber<R>>,
        mapper: Arc<dyn Fn(T) -> Multi<R> + Send + Sync>,
        max_concurrent: u64,
        delay_errors: bool,
        prefetch: u64,
    ) -> Arc<dyn Subscriber<T>> {
        Arc::new_cyclic(|me| Self {
            mapper,
            max_concurrent: max_concurrent.max(1),
            prefetch: prefetch.max(1),
            delay_errors,
            downstream,
            demand: Demand::new(),
            state: TerminalLatch::new(),
            upstream: Arc::new(SubscriptionLink::new()),
            upstream_done: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            ready: Mutex::new(VecDeque::new()),
            inners: Mutex::new(Vec::new()),
            error: Mutex::new(None),
            abort: AtomicBool::new(false),
            wip: AtomicUsize::new(0),
            me: me.clone(),
        })
    }

    fn record_error(&self, error: StreamError) {
        if self.delay_errors {
            self.park_error(error);
            self.drain();
        } else {
            self.abort_with(error);
        }
    }

    fn park_error(&self, error: StreamError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Terminates at once, regardless of the delay policy.
    fn abort_with(&self, error: StreamError) {
        self.park_error(error);
        self.abort.store(true, Ordering::Release);
        self.upstream.cancel();
        self.cancel_inners();
        self.drain();
    }

    fn cancel_inners(&self) {
        let snapshot: Vec<_> = self.inners.lock().drain(..).collect();
        for inner in snapshot {
            inner.link.cancel();
        }
    }

    fn inner_item(&self, item: R, inner: Arc<InnerSubscriber<T, R>>) {
        if self.abort.load(Ordering::Acquire) || self.state.is_terminal() {
            return;
        }
        self.ready.lock().push_back((item, inner));
        self.drain();
    }

    fn inner_terminated(&self, inner: &Arc<InnerSubscriber<T, R>>, error: Option<StreamError>) {
        self.inners.lock().retain(|i| !Arc::ptr_eq(i, inner));
        self.active.fetch_sub(1, Ordering::AcqRel);
        if let Some(e) = error {
            self.record_error(e);
            return;
        }
        if !self.upstream_done.load(Ordering::Acquire) && !self.state.is_terminal() {
            // a finished inner frees one concurrency slot
            self.upstream.request(1);
        }
        self.drain();
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
        if self.abort.load(Ordering::Acquire) {
            if self.state.error() {
                self.ready.lock().clear();
                let error = self
                    .error
                    .lock()
                    .take()
                    .unwrap_or_else(|| StreamError::message("stream failed"));
                self.downstream.on_error(error);
            }
            return;
        }
        if self.state.is_terminal() {
            return;
        }
        loop {
            if self.demand.current() == 0 {
                break;
            }
            let entry = self.ready.lock().pop_front();
            let Some((item, inner)) = entry else {
                break;
            };
            self.demand.produced(1);
            self.downstream.on_next(item);
            if self.abort.load(Ordering::Acquire) || self.state.is_terminal() {
                return;
            }
            inner.replenish();
        }
        if self.upstream_done.load(Ordering::Acquire)
            && self.active.load(Ordering::Acquire) == 0
            && self.ready.lock().is_empty()
        {
            let pending = self.error.lock().take();
            match pending {
                Some(e) => {
                    if self.state.error() {
                        self.downstream.on_error(e);
                    }
                }
                None => {
                    if self.state.complete() {
                        self.downstream.on_complete();
                    }
                }
            }
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> Subscriber<T> for FlattenCoordinator<T, R> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !self.upstream.set(subscription) {
            return;
        }
        self.state.activate();
        if let Some(me) = self.me.upgrade() {
            self.downstream.on_subscribe(me as Arc<dyn Subscription>);
        }
        self.upstream.request(self.max_concurrent);
    }

    fn on_next(&self, item: T) {
        if self.abort.load(Ordering::Acquire) || self.state.is_terminal() {
            return;
        }
        let inner_source = match trap(|| (self.mapper)(item)) {
            Ok(multi) => multi,
            Err(e) => {
                // no further mapping is possible either way
                self.upstream_done.store(true, Ordering::Release);
                self.upstream.cancel();
                self.record_error(e);
                return;
            }
        };
        let Some(parent) = self.me.upgrade() else {
            return;
        };
        let inner = Arc::new_cyclic(|me| InnerSubscriber {
            parent,
            link: Arc::new(SubscriptionLink::new()),
            done: AtomicBool::new(false),
            me: me.clone(),
        });
        self.active.fetch_add(1, Ordering::AcqRel);
        self.inners.lock().push(Arc::clone(&inner));
        inner_source.subscribe(inner as Arc<dyn Subscriber<R>>);
    }

    fn on_error(&self, error: StreamError) {
        self.upstream_done.store(true, Ordering::Release);
        self.record_error(error);
    }

    fn on_complete(&self) {
        self.upstream_done.store(true, Ordering::Release);
        self.drain();
    }
}

impl<T: Send + 'static, R: Send + 'static> Subscription for FlattenCoordinator<T, R> {
    fn request(&self, n: u64) {
        if self.state.is_terminal() {
            return;
        }
        if n == 0 {
            // a downstream violation is not an inner-source error and is
            // never held back by delay_errors
            self.upstream_done.store(true, Ordering::Release);
            self.abort_with(StreamError::protocol("request amount must be positive"));
            return;
        }
        self.demand.add(n);
        self.drain();
    }

    fn cancel(&self) {
        if self.state.cancel() {
            self.upstream.cancel();
            self.cancel_inners();
            self.ready.lock().clear();
        }
    }
}

struct InnerSubscriber<T, R> {
    parent: Arc<FlattenCoordinator<T, R>>,
    link: Arc<SubscriptionLink>,
    done: AtomicBool,
    me: Weak<Self>,
}

impl<T: Send + 'static, R: Send + 'static> InnerSubscriber<T, R> {
    fn replenish(&self) {
        if !self.done.load(Ordering::Acquire) {
            self.link.request(1);
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> Subscriber<R> for InnerSubscriber<T, R> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if self.link.set(subscription) {
            self.link.request(self.parent.prefetch);
        }
    }

    fn on_next(&self, item: R) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        if let Some(me) = self.me.upgrade() {
            self.parent.inner_item(item, me);
        }
    }

    fn on_error(&self, error: StreamError) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.link.clear();
        if let Some(me) = self.me.upgrade() {
            self.parent.inner_terminated(&me, Some(error));
        }
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.link.clear();
        if let Some(me) = self.me.upgrade() {
            self.parent.inner_terminated(&me, None);
        }
    }
}
