//! `limit(n)`: forward at most `n` items, then self-complete.
//!
//! The processor fronts the upstream subscription so downstream requests can
//! be capped: once `n` items' worth of demand has been forwarded upstream, no
//! further demand leaves this stage. Delivery of the `n`-th item cancels
//! upstream and completes downstream in the same call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::core::{Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

pub(crate) struct LimitProcessor<T> {
    limit: u64,
    /// Demand still allowed to travel upstream.
    to_forward: AtomicU64,
    /// Items already delivered downstream.
    emitted: AtomicU64,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
    me: Weak<Self>,
}

impl<T: Send + 'static> LimitProcessor<T> {
    pub(crate) fn create(downstream: Arc<dyn Subscriber<T>>, limit: u64) -> Arc<dyn Subscriber<T>> {
        Arc::new_cyclic(|me| Self {
            limit,
            to_forward: AtomicU64::new(limit),
            emitted: AtomicU64::new(0),
            downstream,
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
            me: me.clone(),
        })
    }
}

impl<T: Send + 'static> Subscriber<T> for LimitProcessor<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !self.upstream.set(subscription) {
            return;
        }
        self.state.activate();
        if let Some(me) = self.me.upgrade() {
            self.downstream.on_subscribe(me as Arc<dyn Subscription>);
        }
        if self.limit == 0 {
            // nothing may ever flow; complete at subscribe time
            self.upstream.cancel();
            if self.state.complete() {
                self.downstream.on_complete();
            }
        }
    }

    fn on_next(&self, item: T) {
        if self.state.is_terminal() {
            return;
        }
        let count = self.emitted.fetch_add(1, Ordering::AcqRel) + 1;
        if count > self.limit {
            return;
        }
        self.downstream.on_next(item);
        if count == self.limit {
            self.upstream.cancel();
            if self.state.complete() {
                self.downstream.on_complete();
            }
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

impl<T: Send + 'static> Subscription for LimitProcessor<T> {
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
        // cap the demand that leaves this stage at the remaining budget
        let mut budget = self.to_forward.load(Ordering::Acquire);
        let claimed = loop {
            if budget == 0 {
                break 0;
            }
            let claim = n.min(budget);
            match self.to_forward.compare_exchange_weak(
                budget,
                budget - claim,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break claim,
                Err(observed) => budget = observed,
            }
        };
        if claimed > 0 {
            self.upstream.request(claimed);
        }
    }

    fn cancel(&self) {
        self.state.cancel();
        self.upstream.cancel();
    }
}

#[cfg(test)]
mod tests {
    use crate::testkit::Recorder;
    use crate::Multi;

    #[test]
    fn test_limit_truncates_and_completes() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 100).limit(3).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_limit_never_over_requests_upstream() {
        // unbounded downstream demand must reach the source capped at 3
        let recorder = Recorder::unbounded();
        let upstream_seen = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        Multi::range(1, 100)
            .on_request({
                let seen = std::sync::Arc::clone(&upstream_seen);
                move |n| {
                    seen.fetch_add(n, std::sync::atomic::Ordering::SeqCst);
                }
            })
            .limit(3)
            .subscribe(recorder.clone());
        assert_eq!(
            upstream_seen.load(std::sync::atomic::Ordering::SeqCst),
            3,
            "demand past the limit must not leak upstream"
        );
    }

    #[test]
    fn test_limit_zero_completes_at_subscribe() {
        let recorder = Recorder::<i64>::passive();
        Multi::range(1, 10).limit(0).subscribe(recorder.clone());
        assert!(recorder.completed());
        assert_eq!(recorder.item_count(), 0);
    }

    #[test]
    fn test_limit_larger_than_source_passes_completion_through() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 3).limit(10).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3]);
        assert!(recorder.completed());
    }
}
