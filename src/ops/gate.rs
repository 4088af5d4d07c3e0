//! Predicate-phase operators: `take_while` and `drop_while`.
//!
//! Both evaluate their predicate once per item while in the stateful phase.
//! `take_while` completes (never errors) on the first failing item and
//! cancels upstream; `drop_while` tops up demand while dropping, then becomes
//! a plain pass-through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::{trap, Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

pub(crate) struct TakeWhileProcessor<T> {
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
}

impl<T: Send + 'static> TakeWhileProcessor<T> {
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

impl<T: Send + 'static> Subscriber<T> for TakeWhileProcessor<T> {
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
            Ok(false) => {
                self.upstream.cancel();
                if self.state.complete() {
                    self.downstream.on_complete();
                }
            }
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

pub(crate) struct DropWhileProcessor<T> {
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    dropping: AtomicBool,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
}

impl<T: Send + 'static> DropWhileProcessor<T> {
    pub(crate) fn create(
        downstream: Arc<dyn Subscriber<T>>,
        predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    ) -> Arc<dyn Subscriber<T>> {
        Arc::new(Self {
            predicate,
            dropping: AtomicBool::new(true),
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

impl<T: Send + 'static> Subscriber<T> for DropWhileProcessor<T> {
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
        if !self.dropping.load(Ordering::Acquire) {
            self.downstream.on_next(item);
            return;
        }
        match trap(|| (self.predicate)(&item)) {
            Ok(true) => self.upstream.request(1),
            Ok(false) => {
                self.dropping.store(false, Ordering::Release);
                self.downstream.on_next(item);
            }
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

#[cfg(test)]
mod tests {
    use crate::testkit::Recorder;
    use crate::Multi;

    #[test]
    fn test_take_while_completes_on_first_failure() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 100)
            .take_while(|n| *n < 4)
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3]);
        assert!(recorder.completed(), "take_while completes, never errors");
    }

    #[test]
    fn test_take_while_passes_full_stream_when_predicate_holds() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 3)
            .take_while(|_| true)
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_drop_while_switches_phase_once() {
        let recorder = Recorder::unbounded();
        // 1,2,3 dropped; 4 flips the phase; the later 1 passes through
        Multi::from_iter(vec![1, 2, 3, 4, 1, 5])
            .drop_while(|n| *n < 4)
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![4, 1, 5]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_drop_while_tops_up_demand_for_dropped_items() {
        let recorder = Recorder::with_request(2);
        Multi::range(1, 100)
            .drop_while(|n| *n <= 10)
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![11, 12]);
    }

    #[test]
    fn test_take_while_predicate_panic_fails_sequence() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 10)
            .take_while(|n| {
                if *n == 2 {
                    panic!("predicate panic");
                }
                true
            })
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1]);
        assert!(recorder.error().is_some());
    }
}
