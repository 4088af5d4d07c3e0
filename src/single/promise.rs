//! One-shot result cell exposed as a publisher.
//!
//! Eager consumers (`for_each`) start the upstream immediately and park their
//! outcome here; the [`Promise`] replays that outcome to any number of later
//! subscribers. The outcome is `Ok(Some(value))`, `Ok(None)` for an empty
//! completion, or a terminal error.
//!
//! Delivery honors demand for a value: errors and empty completions go out
//! right after the handshake, a value waits for the first `request`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Publisher, Subscriber, Subscription};
use crate::error::StreamError;

type Outcome<T> = Result<Option<T>, StreamError>;

enum PromiseState<T> {
    Pending(Vec<Arc<PromiseDelivery<T>>>),
    Done(Outcome<T>),
}

/// Replayable single-value cell; resolves exactly once.
pub(crate) struct Promise<T> {
    state: Mutex<PromiseState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Promise<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PromiseState::Pending(Vec::new())),
        }
    }

    /// Resolves the cell. Later calls lose; the first outcome sticks.
    pub(crate) fn resolve(&self, outcome: Outcome<T>) {
        let waiting = {
            let mut state = self.state.lock();
            match &mut *state {
                PromiseState::Done(_) => return,
                PromiseState::Pending(deliveries) => {
                    let waiting = std::mem::take(deliveries);
                    *state = PromiseState::Done(outcome.clone());
                    waiting
                }
            }
        };
        for delivery in waiting {
            delivery.offer(outcome.clone());
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Publisher<T> for Promise<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let delivery = Arc::new(PromiseDelivery {
            outcome: Mutex::new(None),
            downstream: subscriber,
            wanted: AtomicBool::new(false),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        });
        delivery
            .downstream
            .on_subscribe(Arc::clone(&delivery) as Arc<dyn Subscription>);
        let resolved = {
            let mut state = self.state.lock();
            match &mut *state {
                PromiseState::Done(outcome) => Some(outcome.clone()),
                PromiseState::Pending(deliveries) => {
                    deliveries.push(Arc::clone(&delivery));
                    None
                }
            }
        };
        if let Some(outcome) = resolved {
            delivery.offer(outcome);
        }
    }
}

/// Per-subscriber delivery slot.
struct PromiseDelivery<T> {
    outcome: Mutex<Option<Outcome<T>>>,
    downstream: Arc<dyn Subscriber<T>>,
    wanted: AtomicBool,
    done: AtomicBool,
    cancelled: AtomicBool,
}

impl<T: Send + 'static> PromiseDelivery<T> {
    fn offer(&self, outcome: Outcome<T>) {
        *self.outcome.lock() = Some(outcome);
        self.try_emit();
    }

    fn try_emit(&self) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let needs_demand = match &*self.outcome.lock() {
            Some(Ok(Some(_))) => true,
            Some(_) => false,
            None => return,
        };
        if needs_demand && !self.wanted.load(Ordering::Acquire) {
            return;
        }
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        let outcome = self.outcome.lock().take();
        match outcome {
            Some(Ok(Some(value))) => {
                self.downstream.on_next(value);
                self.downstream.on_complete();
            }
            Some(Ok(None)) => self.downstream.on_complete(),
            Some(Err(error)) => self.downstream.on_error(error),
            None => {}
        }
    }
}

impl<T: Send + 'static> Subscription for PromiseDelivery<T> {
    fn request(&self, n: u64) {
        if self.done.load(Ordering::Acquire) || self.cancelled.load(Ordering::Acquire) {
            return;
        }
        if n == 0 {
            if !self.done.swap(true, Ordering::AcqRel) {
                self.downstream
                    .on_error(StreamError::protocol("request amount must be positive"));
            }
            return;
        }
        self.wanted.store(true, Ordering::Release);
        self.try_emit();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.outcome.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Recorder;

    #[test]
    fn test_value_waits_for_demand() {
        let promise = Arc::new(Promise::new());
        promise.resolve(Ok(Some(42)));

        let recorder = Recorder::<i32>::passive();
        promise.subscribe(recorder.clone() as Arc<dyn Subscriber<i32>>);
        assert_eq!(recorder.item_count(), 0);
        recorder.request(1);
        assert_eq!(recorder.items(), vec![42]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_error_and_empty_arrive_without_demand() {
        let failed = Arc::new(Promise::<i32>::new());
        failed.resolve(Err(StreamError::message("boom")));
        let recorder = Recorder::<i32>::passive();
        failed.subscribe(recorder.clone() as Arc<dyn Subscriber<i32>>);
        assert!(recorder.error().is_some());

        let empty = Arc::new(Promise::<i32>::new());
        empty.resolve(Ok(None));
        let recorder = Recorder::<i32>::passive();
        empty.subscribe(recorder.clone() as Arc<dyn Subscriber<i32>>);
        assert!(recorder.completed());
    }

    #[test]
    fn test_late_resolution_reaches_waiting_subscriber() {
        let promise = Arc::new(Promise::new());
        let recorder = Recorder::<i32>::unbounded();
        promise.subscribe(recorder.clone() as Arc<dyn Subscriber<i32>>);
        assert!(recorder.terminal().is_none(), "not resolved yet");

        promise.resolve(Ok(Some(7)));
        assert_eq!(recorder.items(), vec![7]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_first_resolution_wins() {
        let promise = Arc::new(Promise::new());
        promise.resolve(Ok(Some(1)));
        promise.resolve(Ok(Some(2)));
        let recorder = Recorder::<i32>::unbounded();
        promise.subscribe(recorder.clone() as Arc<dyn Subscriber<i32>>);
        assert_eq!(recorder.items(), vec![1]);
    }

    #[test]
    fn test_outcome_replays_to_every_subscriber() {
        let promise = Arc::new(Promise::new());
        promise.resolve(Ok(Some(5)));
        for _ in 0..2 {
            let recorder = Recorder::<i32>::unbounded();
            promise.subscribe(recorder.clone() as Arc<dyn Subscriber<i32>>);
            assert_eq!(recorder.items(), vec![5]);
        }
    }
}
