//! `concat(a, b, …)`: strictly sequential concatenation.
//!
//! The coordinator subscribes to one member at a time; only a normal
//! completion advances to the next member, so sources never run
//! concurrently and an unstarted member is never subscribed. Errors
//! propagate immediately. Demand is carried across member boundaries by a
//! [`SubscriptionArbiter`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::core::{Publisher, Subscriber, Subscription, SubscriptionArbiter, TerminalLatch};
use crate::error::StreamError;
use crate::multi::Multi;

/// Publisher over an ordered list of member sequences.
pub(crate) struct ConcatSource<T> {
    sources: Arc<Vec<Multi<T>>>,
}

impl<T: Send + 'static> ConcatSource<T> {
    pub(crate) fn new(sources: Vec<Multi<T>>) -> Self {
        Self {
            sources: Arc::new(sources),
        }
    }
}

impl<T: Send + 'static> Publisher<T> for ConcatSource<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let coordinator = Arc::new_cyclic(|me| ConcatCoordinator {
            sources: Arc::clone(&self.sources),
            index: AtomicUsize::new(0),
            handshake_done: AtomicBool::new(false),
            arbiter: Arc::new(SubscriptionArbiter::new()),
            downstream: subscriber,
            state: TerminalLatch::new(),
            me: me.clone(),
        });
        coordinator.start();
    }
}

struct ConcatCoordinator<T> {
    sources: Arc<Vec<Multi<T>>>,
    /// Next member to subscribe.
    index: AtomicUsize,
    handshake_done: AtomicBool,
    arbiter: Arc<SubscriptionArbiter>,
    downstream: Arc<dyn Subscriber<T>>,
    state: TerminalLatch,
    me: Weak<Self>,
}

impl<T: Send + 'static> ConcatCoordinator<T> {
    fn start(self: &Arc<Self>) {
        if self.sources.is_empty() {
            self.state.activate();
            self.downstream
                .on_subscribe(Arc::clone(&self.arbiter) as Arc<dyn Subscription>);
            if self.state.complete() {
                self.downstream.on_complete();
            }
            return;
        }
        self.subscribe_next();
    }

    fn subscribe_next(&self) {
        if self.arbiter.is_cancelled() || self.state.is_terminal() {
            return;
        }
        let next = self.index.fetch_add(1, Ordering::AcqRel);
        match self.sources.get(next) {
            Some(source) => {
                if let Some(me) = self.me.upgrade() {
                    source.subscribe(me as Arc<dyn Subscriber<T>>);
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

impl<T: Send + 'static> Subscriber<T> for ConcatCoordinator<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.arbiter.switch_to(subscription);
        if !self.handshake_done.swap(true, Ordering::AcqRel) {
            self.state.activate();
            self.downstream
                .on_subscribe(Arc::clone(&self.arbiter) as Arc<dyn Subscription>);
        }
    }

    fn on_next(&self, item: T) {
        if self.state.is_terminal() || self.arbiter.is_cancelled() {
            return;
        }
        self.arbiter.produced_one();
        self.downstream.on_next(item);
    }

    fn on_error(&self, error: StreamError) {
        // any member error ends the whole concatenation
        if self.state.error() {
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        self.subscribe_next();
    }
}

#[cfg(test)]
mod tests {
    use crate::testkit::Recorder;
    use crate::{Multi, StreamError};

    #[test]
    fn test_concat_preserves_member_order() {
        let recorder = Recorder::unbounded();
        Multi::concat(vec![Multi::range(1, 3), Multi::range(10, 2)])
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 3, 10, 11]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_concat_of_nothing_completes() {
        let recorder = Recorder::<i64>::unbounded();
        Multi::<i64>::concat(vec![]).subscribe(recorder.clone());
        assert!(recorder.completed());
        assert_eq!(recorder.item_count(), 0);
    }

    #[test]
    fn test_concat_skips_empty_members() {
        let recorder = Recorder::unbounded();
        Multi::concat(vec![Multi::empty(), Multi::range(5, 2), Multi::empty()])
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![5, 6]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_member_error_stops_the_chain() {
        let started_third = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let third = Multi::range(100, 5).peek({
            let started = std::sync::Arc::clone(&started_third);
            move |_| started.store(true, std::sync::atomic::Ordering::SeqCst)
        });
        let recorder = Recorder::unbounded();
        Multi::concat(vec![
            Multi::range(1, 2),
            Multi::error(StreamError::message("boom")),
            third,
        ])
        .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2]);
        assert!(recorder.error().is_some());
        assert!(
            !started_third.load(std::sync::atomic::Ordering::SeqCst),
            "members after a failed one must never start"
        );
    }

    #[test]
    fn test_demand_spans_member_boundaries() {
        let recorder = Recorder::with_request(4);
        Multi::concat(vec![Multi::range(1, 2), Multi::range(10, 5)])
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2, 10, 11]);
        assert!(recorder.terminal().is_none());
    }
}
