//! Predicate filter processor.
//!
//! A dropped item is replaced by a `request(1)` top-up upstream, so the
//! demand downstream asked for stays satisfiable. A panicking predicate fails
//! the sequence.

use std::sync::Arc;

use crate::core::{trap, Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

pub(crate) struct FilterProcessor<T> {
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
}

impl<T: Send + 'static> FilterProcessor<T> {
    pub(crate) fn create(
        downstream: Arc<dyn Subscriber<T>>,
        predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    ) -> Arc<dyn Subscriber<T>> {
        Arc::new(Self {
            predicate,
            downstream,
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
        })
    }

    fn fail(&self, error: StreamError) {
        self.upstream.cancel();
        if self.state.error() {
            self.downstream.on_error(error);
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for FilterProcessor<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !self.upstream.set(subscription) {
            return;
        }
        self.state.activate();
        self.downstream
            .on_subscribe(Arc::clone(&self.upstream) as Arc<dyn Subscription>);
    }

    fn on_next(&self, item: T) {
        if self.state.is_terminal() {
            return;
        }
        match trap(|| (self.predicate)(&item)) {
            Ok(true) => self.downstream.on_next(item),
            Ok(false) => self.upstream.request(1),
            Err(e) => self.fail(e),
        }
    }

    fn on_error(&self, error: StreamError) {
        if self.state.error() {
            self.upstream.clear();
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        if self.state.complete() {
            self.upstream.clear();
            self.downstream.on_complete();
        }
    }
}
