//! Shared test subscriber.
//!
//! [`Recorder`] captures everything a subscription delivers — items, the
//! terminal signal, the subscription handle — and lets tests drive demand
//! manually. Compiled only for tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Subscriber, Subscription};
use crate::error::StreamError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Terminal {
    Completed,
    Errored(String),
}

pub(crate) struct Recorder<T> {
    items: Mutex<Vec<T>>,
    terminal: Mutex<Option<Terminal>>,
    error: Mutex<Option<StreamError>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    initial_request: u64,
}

impl<T: Send + 'static> Recorder<T> {
    /// Recorder that requests `initial` items as soon as it is subscribed.
    pub(crate) fn with_request(initial: u64) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(Vec::new()),
            terminal: Mutex::new(None),
            error: Mutex::new(None),
            subscription: Mutex::new(None),
            initial_request: initial,
        })
    }

    /// Recorder with unbounded initial demand.
    pub(crate) fn unbounded() -> Arc<Self> {
        Self::with_request(crate::Demand::UNBOUNDED)
    }

    /// Recorder that requests nothing until told to.
    pub(crate) fn passive() -> Arc<Self> {
        Self::with_request(0)
    }

    pub(crate) fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.lock().clone()
    }

    pub(crate) fn item_count(&self) -> usize {
        self.items.lock().len()
    }

    pub(crate) fn terminal(&self) -> Option<Terminal> {
        self.terminal.lock().clone()
    }

    pub(crate) fn completed(&self) -> bool {
        matches!(self.terminal(), Some(Terminal::Completed))
    }

    pub(crate) fn error(&self) -> Option<StreamError> {
        self.error.lock().clone()
    }

    pub(crate) fn request(&self, n: u64) {
        let subscription = self.subscription.lock().clone();
        if let Some(s) = subscription {
            s.request(n);
        }
    }

    pub(crate) fn cancel(&self) {
        let subscription = self.subscription.lock().clone();
        if let Some(s) = subscription {
            s.cancel();
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for Recorder<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock() = Some(Arc::clone(&subscription));
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&self, item: T) {
        assert!(
            self.terminal.lock().is_none(),
            "on_next after terminal signal"
        );
        self.items.lock().push(item);
    }

    fn on_error(&self, error: StreamError) {
        let mut terminal = self.terminal.lock();
        assert!(terminal.is_none(), "second terminal signal (error)");
        *terminal = Some(Terminal::Errored(error.as_label().to_string()));
        *self.error.lock() = Some(error);
    }

    fn on_complete(&self) {
        let mut terminal = self.terminal.lock();
        assert!(terminal.is_none(), "second terminal signal (complete)");
        *terminal = Some(Terminal::Completed);
    }
}
