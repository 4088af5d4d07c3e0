//! Fallback switching: the `on_error_resume*` / `on_complete_resume*` family.
//!
//! On the configured trigger (upstream error, or upstream normal completion)
//! the processor computes a fallback sequence and re-subscribes itself to it.
//! Demand is carried across the switch by a [`SubscriptionArbiter`]: the
//! fallback source immediately receives whatever the downstream still has
//! outstanding. The fallback runs at most once — a failure inside the
//! fallback itself propagates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::core::{trap, Subscriber, Subscription, SubscriptionArbiter, TerminalLatch};
use crate::error::StreamError;
use crate::multi::Multi;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResumeTrigger {
    /// Switch to the fallback when upstream errors.
    OnError,
    /// Append the fallback after upstream completes normally.
    OnComplete,
}

/// Computes the fallback sequence; receives the error for [`ResumeTrigger::OnError`].
pub(crate) type FallbackFn<T> = Arc<dyn Fn(Option<&StreamError>) -> Multi<T> + Send + Sync>;

pub(crate) struct ResumeProcessor<T> {
    trigger: ResumeTrigger,
    fallback: FallbackFn<T>,
    in_fallback: AtomicBool,
    handshake_done: AtomicBool,
    arbiter: Arc<SubscriptionArbiter>,
    downstream: Arc<dyn Subscriber<T>>,
    state: TerminalLatch,
    me: Weak<Self>,
}

impl<T: Send + 'static> ResumeProcessor<T> {
    pub(crate) fn create(
        downstream: Arc<dyn Subscriber<T>>,
        trigger: ResumeTrigger,
        fallback: FallbackFn<T>,
    ) -> Arc<dyn Subscriber<T>> {
        Arc::new_cyclic(|me| Self {
            trigger,
            fallback,
            in_fallback: AtomicBool::new(false),
            handshake_done: AtomicBool::new(false),
            arbiter: Arc::new(SubscriptionArbiter::new()),
            downstream,
            state: TerminalLatch::new(),
            me: me.clone(),
        })
    }

    fn switch_to_fallback(&self, error: Option<&StreamError>) {
        self.in_fallback.store(true, Ordering::Release);
        let fallback = match trap(|| (self.fallback)(error)) {
            Ok(multi) => multi,
            Err(e) => {
                if self.state.error() {
                    self.downstream.on_error(e);
                }
                return;
            }
        };
        if let Some(me) = self.me.upgrade() {
            fallback.subscribe(me as Arc<dyn Subscriber<T>>);
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for ResumeProcessor<T> {
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
        if self.state.is_terminal() {
            return;
        }
        let already_resumed = self.in_fallback.load(Ordering::Acquire);
        if self.trigger == ResumeTrigger::OnError && !already_resumed {
            self.switch_to_fallback(Some(&error));
            return;
        }
        if self.state.error() {
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        if self.state.is_terminal() {
            return;
        }
        let already_resumed = self.in_fallback.load(Ordering::Acquire);
        if self.trigger == ResumeTrigger::OnComplete && !already_resumed {
            self.switch_to_fallback(None);
            return;
        }
        if self.state.complete() {
            self.downstream.on_complete();
        }
    }
}
