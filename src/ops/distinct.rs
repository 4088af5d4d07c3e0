//! `distinct()`: equality-based deduplication.
//!
//! Keeps a set of every item seen for the lifetime of the subscription —
//! unbounded memory use is the accepted tradeoff of this operator. Duplicate
//! items are topped up with `request(1)` like filter misses.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

pub(crate) struct DistinctProcessor<T> {
    seen: Mutex<HashSet<T>>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
}

impl<T> DistinctProcessor<T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    pub(crate) fn create(downstream: Arc<dyn Subscriber<T>>) -> Arc<dyn Subscriber<T>> {
        Arc::new(Self {
            seen: Mutex::new(HashSet::new()),
            downstream,
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
        })
    }
}

impl<T> Subscriber<T> for DistinctProcessor<T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
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
        let fresh = self.seen.lock().insert(item.clone());
        if fresh {
            self.downstream.on_next(item);
        } else {
            self.upstream.request(1);
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
    fn test_distinct_drops_duplicates_keeps_first_occurrence() {
        let recorder = Recorder::unbounded();
        Multi::from_iter(vec![1, 2, 1, 3, 2, 4])
            .distinct()
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3, 4]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_distinct_tops_up_demand_for_duplicates() {
        let recorder = Recorder::with_request(3);
        Multi::from_iter(vec![1, 1, 1, 1, 2, 2, 3, 4])
            .distinct()
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3]);
    }

    #[test]
    fn test_distinct_state_is_per_subscription() {
        let source = Multi::from_iter(vec![1, 1, 2]).distinct();
        let first = Recorder::unbounded();
        let second = Recorder::unbounded();
        source.subscribe(first.clone());
        source.subscribe(second.clone());
        assert_eq!(first.items(), vec![1, 2]);
        assert_eq!(
            second.items(),
            vec![1, 2],
            "seen-set must not leak across subscriptions"
        );
    }
}
