//! `skip(n)`: drop the first `n` items.
//!
//! Dropped items do not count against downstream demand — each one is topped
//! up with a `request(1)` upstream, like a filter miss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::{Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

pub(crate) struct SkipProcessor<T> {
    remaining: AtomicU64,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
}

impl<T: Send + 'static> SkipProcessor<T> {
    pub(crate) fn create(downstream: Arc<dyn Subscriber<T>>, n: u64) -> Arc<dyn Subscriber<T>> {
        Arc::new(Self {
            remaining: AtomicU64::new(n),
            downstream,
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
        })
    }
}

impl<T: Send + 'static> Subscriber<T> for SkipProcessor<T> {
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
        let dropped = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
            .is_ok();
        if dropped {
            self.upstream.request(1);
        } else {
            self.downstream.on_next(item);
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

#[cfg(test)]
mod tests {
    use crate::testkit::Recorder;
    use crate::Multi;

    #[test]
    fn test_skip_drops_prefix() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 6).skip(2).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![3, 4, 5, 6]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_skipped_items_do_not_consume_downstream_demand() {
        let recorder = Recorder::with_request(2);
        Multi::range(1, 100).skip(5).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![6, 7]);
        assert!(recorder.terminal().is_none());
    }

    #[test]
    fn test_skip_more_than_source_completes_empty() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 3).skip(10).subscribe(recorder.clone());
        assert_eq!(recorder.item_count(), 0);
        assert!(recorder.completed());
    }

    #[test]
    fn test_skip_zero_is_identity() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 3).skip(0).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3]);
    }
}
