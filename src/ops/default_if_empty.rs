//! `default_if_empty`: emit a fallback item when upstream completes empty.
//!
//! The processor tracks whether at least one item was seen. On an empty
//! completion the fallback supplier is invoked lazily — at the point of
//! emptiness detection, never at subscribe time — and the fallback item still
//! waits for downstream demand before it is delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::core::{trap, Demand, Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

pub(crate) struct DefaultIfEmptyProcessor<T> {
    supplier: Arc<dyn Fn() -> T + Send + Sync>,
    saw_item: AtomicBool,
    empty_completion: AtomicBool,
    fallback_claimed: AtomicBool,
    demand: Demand,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
    me: Weak<Self>,
}

impl<T: Send + 'static> DefaultIfEmptyProcessor<T> {
    pub(crate) fn create(
        downstream: Arc<dyn Subscriber<T>>,
        supplier: Arc<dyn Fn() -> T + Send + Sync>,
    ) -> Arc<dyn Subscriber<T>> {
        Arc::new_cyclic(|me| Self {
            supplier,
            saw_item: AtomicBool::new(false),
            empty_completion: AtomicBool::new(false),
            fallback_claimed: AtomicBool::new(false),
            demand: Demand::new(),
            downstream,
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
            me: me.clone(),
        })
    }

    fn try_emit_fallback(&self) {
        if !self.empty_completion.load(Ordering::Acquire) {
            return;
        }
        if self.demand.current() == 0 {
            return;
        }
        if self.fallback_claimed.swap(true, Ordering::AcqRel) {
            return;
        }
        match trap(|| (self.supplier)()) {
            Ok(value) => {
                self.demand.produced(1);
                self.downstream.on_next(value);
                if self.state.complete() {
                    self.downstream.on_complete();
                }
            }
            Err(e) => {
                if self.state.error() {
                    self.downstream.on_error(e);
                }
            }
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for DefaultIfEmptyProcessor<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !self.upstream.set(subscription) {
            return;
        }
        self.state.activate();
        if let Some(me) = self.me.upgrade() {
            self.downstream.on_subscribe(me as Arc<dyn Subscription>);
        }
    }

    fn on_next(&self, item: T) {
        if self.state.is_terminal() {
            return;
        }
        self.saw_item.store(true, Ordering::Release);
        self.demand.produced(1);
        self.downstream.on_next(item);
    }

    fn on_error(&self, error: StreamError) {
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
        if self.saw_item.load(Ordering::Acquire) {
            if self.state.complete() {
                self.downstream.on_complete();
            }
            return;
        }
        self.empty_completion.store(true, Ordering::Release);
        self.try_emit_fallback();
    }
}

impl<T: Send + 'static> Subscription for DefaultIfEmptyProcessor<T> {
    fn request(&self, n: u64) {
        if self.state.is_terminal() {
            return;
        }
        if n == 0 {
            self.upstream.cancel();
            if self.state.error() {
                self.downstream
                    .on_error(StreamError::protocol("request amount must be positive"));
            }
            return;
        }
        self.demand.add(n);
        self.upstream.request(n);
        self.try_emit_fallback();
    }

    fn cancel(&self) {
        self.state.cancel();
        self.upstream.cancel();
    }
}
