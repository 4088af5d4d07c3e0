//! Cold sources backing the `Multi`/`Single` factories.
//!
//! [`IterSource`] is the workhorse: a factory producing a fresh iterator per
//! subscriber, drained strictly by demand. `just`, `from_iter`, `range`,
//! `generate` and `empty` all reduce to it. Replay semantics fall out of the
//! factory shape — every subscriber gets its own iterator, never a shared
//! cursor.
//!
//! Exhaustion is detected with a one-item lookahead (`Peekable`), which lets
//! empty sources complete without any demand and lets finite sources complete
//! together with their last item.

use std::iter::Peekable;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{
    trap, Demand, Publisher, Subscriber, Subscription, TerminalLatch, TerminatedSubscription,
};
use crate::error::StreamError;

/// Factory producing one independent iterator per subscriber.
pub(crate) type IterFactory<T> =
    Arc<dyn Fn() -> Box<dyn Iterator<Item = T> + Send> + Send + Sync>;

/// Demand-driven publisher over factory-produced iterators.
pub(crate) struct IterSource<T> {
    make: IterFactory<T>,
}

impl<T: Send + 'static> IterSource<T> {
    pub(crate) fn new(make: IterFactory<T>) -> Self {
        Self { make }
    }
}

impl<T: Send + 'static> Publisher<T> for IterSource<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let iter = match trap(|| (self.make)()) {
            Ok(iter) => iter,
            Err(e) => {
                subscriber.on_subscribe(Arc::new(TerminatedSubscription));
                subscriber.on_error(e);
                return;
            }
        };
        let subscription = Arc::new(IterSubscription {
            iter: Mutex::new(iter.peekable()),
            demand: Demand::new(),
            state: TerminalLatch::active(),
            wip: AtomicUsize::new(0),
            downstream: Arc::clone(&subscriber),
        });
        subscriber.on_subscribe(Arc::clone(&subscription) as Arc<dyn Subscription>);
        // empty sources complete here, before any demand arrives
        subscription.drain();
    }
}

struct IterSubscription<T> {
    iter: Mutex<Peekable<Box<dyn Iterator<Item = T> + Send>>>,
    demand: Demand,
    state: TerminalLatch,
    wip: AtomicUsize,
    downstream: Arc<dyn Subscriber<T>>,
}

impl<T: Send + 'static> IterSubscription<T> {
    /// Serialized drain: only one thread runs `work` at a time, late callers
    /// leave a wakeup mark in `wip`.
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
        loop {
            if self.state.is_terminal() {
                return;
            }
            let exhausted = {
                let mut iter = self.iter.lock();
                trap(|| iter.peek().is_none())
            };
            match exhausted {
                Err(e) => {
                    self.terminate_with(e);
                    return;
                }
                Ok(true) => {
                    if self.state.complete() {
                        self.downstream.on_complete();
                    }
                    return;
                }
                Ok(false) => {}
            }
            if self.demand.current() == 0 {
                return;
            }
            let item = {
                let mut iter = self.iter.lock();
                trap(|| iter.next())
            };
            match item {
                Err(e) => {
                    self.terminate_with(e);
                    return;
                }
                Ok(Some(value)) => {
                    self.demand.produced(1);
                    self.downstream.on_next(value);
                }
                Ok(None) => {
                    if self.state.complete() {
                        self.downstream.on_complete();
                    }
                    return;
                }
            }
        }
    }

    fn terminate_with(&self, error: StreamError) {
        if self.state.error() {
            self.downstream.on_error(error);
        }
    }
}

impl<T: Send + 'static> Subscription for IterSubscription<T> {
    fn request(&self, n: u64) {
        if self.state.is_terminal() {
            return;
        }
        if n == 0 {
            self.terminate_with(StreamError::protocol("request amount must be positive"));
            return;
        }
        self.demand.add(n);
        self.drain();
    }

    fn cancel(&self) {
        self.state.cancel();
    }
}

/// Publisher that fails every subscriber with a clone of one error.
pub(crate) struct FailedSource<T> {
    error: StreamError,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> FailedSource<T> {
    pub(crate) fn new(error: StreamError) -> Self {
        Self {
            error,
            _marker: PhantomData,
        }
    }
}

impl<T: Send + 'static> Publisher<T> for FailedSource<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        subscriber.on_subscribe(Arc::new(TerminatedSubscription));
        subscriber.on_error(self.error.clone());
    }
}

/// Publisher that never signals anything after the handshake.
pub(crate) struct NeverSource<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> NeverSource<T> {
    pub(crate) fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Send + 'static> Publisher<T> for NeverSource<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let subscription = Arc::new(NeverSubscription {
            state: TerminalLatch::active(),
            downstream: Arc::clone(&subscriber) as Arc<dyn Subscriber<T>>,
        });
        subscriber.on_subscribe(subscription);
    }
}

struct NeverSubscription<T> {
    state: TerminalLatch,
    downstream: Arc<dyn Subscriber<T>>,
}

impl<T: Send + 'static> Subscription for NeverSubscription<T> {
    fn request(&self, n: u64) {
        // demand is accepted and never satisfied; zero is still a violation
        if n == 0 && self.state.error() {
            self.downstream
                .on_error(StreamError::protocol("request amount must be positive"));
        }
    }

    fn cancel(&self) {
        self.state.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Recorder;
    use crate::Multi;

    #[test]
    fn test_range_emits_in_order() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 5).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3, 4, 5]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_empty_completes_without_demand() {
        let recorder = Recorder::<i64>::passive();
        Multi::<i64>::empty().subscribe(recorder.clone());
        assert!(recorder.completed(), "empty must complete eagerly");
        assert_eq!(recorder.item_count(), 0);
    }

    #[test]
    fn test_backpressure_holds_items_until_requested() {
        let recorder = Recorder::with_request(2);
        Multi::range(1, 10).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2], "only requested items flow");
        assert!(recorder.terminal().is_none());

        recorder.request(3);
        assert_eq!(recorder.items(), vec![1, 2, 3, 4, 5]);
        assert!(recorder.terminal().is_none());
    }

    #[test]
    fn test_completion_arrives_with_exact_demand() {
        let recorder = Recorder::with_request(5);
        Multi::range(1, 5).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3, 4, 5]);
        assert!(
            recorder.completed(),
            "lookahead must complete once the last item is out"
        );
    }

    #[test]
    fn test_error_source_replays_to_each_subscriber() {
        let source = Multi::<i64>::error(StreamError::message("boom"));
        for _ in 0..2 {
            let recorder = Recorder::<i64>::unbounded();
            source.subscribe(recorder.clone());
            let err = recorder.error().expect("must fail");
            assert_eq!(err.as_label(), "stream_failed");
        }
    }

    #[test]
    fn test_never_source_stays_silent() {
        let recorder = Recorder::<i64>::unbounded();
        Multi::<i64>::never().subscribe(recorder.clone());
        assert_eq!(recorder.item_count(), 0);
        assert!(recorder.terminal().is_none());
    }

    #[test]
    fn test_request_zero_is_a_protocol_error() {
        let recorder = Recorder::<i64>::passive();
        Multi::range(1, 3).subscribe(recorder.clone());
        recorder.request(0);
        let err = recorder.error().expect("zero demand must fail");
        assert!(err.is_protocol(), "got {err:?}");
    }

    #[test]
    fn test_generate_is_driven_by_demand_only() {
        let recorder = Recorder::with_request(4);
        let tick = Arc::new(std::sync::atomic::AtomicU64::new(0));
        Multi::generate({
            let tick = Arc::clone(&tick);
            move || tick.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        })
        .subscribe(recorder.clone());
        assert_eq!(
            recorder.items(),
            vec![0, 1, 2, 3],
            "infinite supplier must emit exactly the demand"
        );
        assert!(recorder.terminal().is_none());
    }

    #[test]
    fn test_just_replays_independently() {
        let source = Multi::just(vec![10, 20, 30]);
        let first = Recorder::unbounded();
        let second = Recorder::unbounded();
        source.subscribe(first.clone());
        source.subscribe(second.clone());
        assert_eq!(first.items(), vec![10, 20, 30]);
        assert_eq!(second.items(), vec![10, 20, 30]);
        assert!(first.completed() && second.completed());
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let recorder = Recorder::with_request(2);
        Multi::range(1, 100).subscribe(recorder.clone());
        recorder.cancel();
        recorder.request(50);
        assert_eq!(recorder.items(), vec![1, 2], "no items after cancel");
        assert!(recorder.terminal().is_none(), "cancel is not a signal");
    }
}
