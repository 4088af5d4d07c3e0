//! Signal taps: peek plus the hook family.
//!
//! One processor carries every optional hook; the public operators (`peek`,
//! `on_error_hook`, `on_complete_hook`, `on_terminate`, `on_cancel`,
//! `on_request`) each set a single slot. The processor fronts the upstream
//! subscription so it can observe `request`/`cancel` on the way up.
//!
//! Hook semantics:
//! - the item hook runs before forwarding; a panic fails the sequence;
//! - the completion hook runs before `on_complete`; a panic replaces the
//!   completion with the trapped error;
//! - error/terminate/cancel hooks are trapped and their panics dropped — the
//!   sequence is already terminating.

use std::sync::{Arc, Weak};

use crate::core::{trap, Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

type ItemHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&StreamError) + Send + Sync>;
type UnitHook = Arc<dyn Fn() + Send + Sync>;
type RequestHook = Arc<dyn Fn(u64) + Send + Sync>;

/// Optional hook slots for one tap stage.
pub(crate) struct TapHooks<T> {
    pub(crate) on_item: Option<ItemHook<T>>,
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) on_complete: Option<UnitHook>,
    pub(crate) on_terminate: Option<UnitHook>,
    pub(crate) on_cancel: Option<UnitHook>,
    pub(crate) on_request: Option<RequestHook>,
}

impl<T> TapHooks<T> {
    pub(crate) fn none() -> Self {
        Self {
            on_item: None,
            on_error: None,
            on_complete: None,
            on_terminate: None,
            on_cancel: None,
            on_request: None,
        }
    }
}

impl<T> Clone for TapHooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_item: self.on_item.clone(),
            on_error: self.on_error.clone(),
            on_complete: self.on_complete.clone(),
            on_terminate: self.on_terminate.clone(),
            on_cancel: self.on_cancel.clone(),
            on_request: self.on_request.clone(),
        }
    }
}

pub(crate) struct TapProcessor<T> {
    hooks: TapHooks<T>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
    me: Weak<Self>,
}

impl<T: Send + 'static> TapProcessor<T> {
    pub(crate) fn create(
        downstream: Arc<dyn Subscriber<T>>,
        hooks: TapHooks<T>,
    ) -> Arc<dyn Subscriber<T>> {
        Arc::new_cyclic(|me| Self {
            hooks,
            downstream,
            upstream: Arc::new(SubscriptionLink::new()),
            state: TerminalLatch::new(),
            me: me.clone(),
        })
    }

    fn run_terminate_hook(&self) {
        if let Some(hook) = &self.hooks.on_terminate {
            let _ = trap(|| hook());
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for TapProcessor<T> {
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
        if let Some(hook) = &self.hooks.on_item {
            if let Err(e) = trap(|| hook(&item)) {
                self.upstream.cancel();
                if self.state.error() {
                    self.run_terminate_hook();
                    self.downstream.on_error(e);
                }
                return;
            }
        }
        self.downstream.on_next(item);
    }

    fn on_error(&self, error: StreamError) {
        if !self.state.error() {
            return;
        }
        self.upstream.clear();
        if let Some(hook) = &self.hooks.on_error {
            let _ = trap(|| hook(&error));
        }
        self.run_terminate_hook();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if !self.state.complete() {
            return;
        }
        self.upstream.clear();
        if let Some(hook) = &self.hooks.on_complete {
            if let Err(e) = trap(|| hook()) {
                self.run_terminate_hook();
                self.downstream.on_error(e);
                return;
            }
        }
        self.run_terminate_hook();
        self.downstream.on_complete();
    }
}

impl<T: Send + 'static> Subscription for TapProcessor<T> {
    fn request(&self, n: u64) {
        if let Some(hook) = &self.hooks.on_request {
            let _ = trap(|| hook(n));
        }
        self.upstream.request(n);
    }

    fn cancel(&self) {
        if self.state.cancel() {
            if let Some(hook) = &self.hooks.on_cancel {
                let _ = trap(|| hook());
            }
            self.run_terminate_hook();
        }
        self.upstream.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Recorder;
    use crate::Multi;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[test]
    fn test_peek_observes_every_item_in_order() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = Recorder::unbounded();
        Multi::range(1, 3)
            .peek({
                let seen = Arc::clone(&seen);
                move |n| seen.lock().push(*n)
            })
            .subscribe(recorder.clone());
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(recorder.items(), vec![1, 2, 3]);
    }

    #[test]
    fn test_on_cancel_hook_fires_once() {
        let cancels = Arc::new(AtomicU64::new(0));
        let recorder = Recorder::<i64>::with_request(1);
        Multi::range(1, 100)
            .on_cancel({
                let cancels = Arc::clone(&cancels);
                move || {
                    cancels.fetch_add(1, Ordering::SeqCst);
                }
            })
            .subscribe(recorder.clone());
        recorder.cancel();
        recorder.cancel();
        assert_eq!(
            cancels.load(Ordering::SeqCst),
            1,
            "second cancel must have no observable effect"
        );
    }

    #[test]
    fn test_on_terminate_fires_for_completion() {
        let terminated = Arc::new(AtomicBool::new(false));
        let recorder = Recorder::unbounded();
        Multi::range(1, 2)
            .on_terminate({
                let terminated = Arc::clone(&terminated);
                move || terminated.store(true, Ordering::SeqCst)
            })
            .subscribe(recorder.clone());
        assert!(recorder.completed());
        assert!(terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_on_error_hook_sees_the_error() {
        let label = Arc::new(parking_lot::Mutex::new(String::new()));
        let recorder = Recorder::<i64>::unbounded();
        Multi::<i64>::error(StreamError::message("boom"))
            .on_error_hook({
                let label = Arc::clone(&label);
                move |e| *label.lock() = e.as_label().to_string()
            })
            .subscribe(recorder.clone());
        assert_eq!(*label.lock(), "stream_failed");
        assert!(recorder.error().is_some());
    }

    #[test]
    fn test_on_request_observes_demand() {
        let total = Arc::new(AtomicU64::new(0));
        let recorder = Recorder::with_request(7);
        Multi::range(1, 100)
            .on_request({
                let total = Arc::clone(&total);
                move |n| {
                    total.fetch_add(n, Ordering::SeqCst);
                }
            })
            .subscribe(recorder.clone());
        assert_eq!(total.load(Ordering::SeqCst), 7);
        assert_eq!(recorder.item_count(), 7);
    }

    #[test]
    fn test_item_hook_panic_fails_sequence_and_terminates() {
        let terminated = Arc::new(AtomicBool::new(false));
        let recorder = Recorder::unbounded();
        Multi::range(1, 10)
            .peek(|n| {
                if *n == 2 {
                    panic!("peek panic");
                }
            })
            .on_terminate({
                let terminated = Arc::clone(&terminated);
                move || terminated.store(true, Ordering::SeqCst)
            })
            .subscribe(recorder.clone());
        let err = recorder.error().expect("panic must fail the stream");
        assert_eq!(err.as_label(), "stream_callback_panic");
        assert!(terminated.load(Ordering::SeqCst));
    }
}
