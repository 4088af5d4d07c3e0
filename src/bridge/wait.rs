//! Blocking rendezvous between a subscription and a waiting thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{Demand, Subscriber, Subscription, SubscriptionLink};
use crate::error::StreamError;
use crate::multi::Multi;

/// Blocks until the sequence terminates; returns every item it produced.
pub(crate) fn wait<T: Send + 'static>(source: &Multi<T>) -> Result<Vec<T>, StreamError> {
    let (cell, _link) = attach(source);
    let mut guard = cell.slot.lock();
    loop {
        if let Some(result) = guard.take() {
            return result;
        }
        cell.signal.wait(&mut guard);
    }
}

/// Blocks like [`wait`], giving up after `timeout`.
///
/// On expiry the subscription is cancelled and
/// [`StreamError::AwaitTimeout`] returned. A zero timeout still observes a
/// result that is already there.
pub(crate) fn wait_timeout<T: Send + 'static>(
    source: &Multi<T>,
    timeout: Duration,
) -> Result<Vec<T>, StreamError> {
    let deadline = Instant::now() + timeout;
    let (cell, link) = attach(source);
    let mut guard = cell.slot.lock();
    loop {
        if let Some(result) = guard.take() {
            return result;
        }
        if cell.signal.wait_until(&mut guard, deadline).timed_out() {
            // one last look: the terminal may have landed with the wakeup
            if let Some(result) = guard.take() {
                return result;
            }
            drop(guard);
            link.cancel();
            return Err(StreamError::AwaitTimeout { timeout });
        }
    }
}

fn attach<T: Send + 'static>(source: &Multi<T>) -> (Arc<WaitCell<T>>, Arc<SubscriptionLink>) {
    let cell = Arc::new(WaitCell {
        slot: Mutex::new(None),
        signal: Condvar::new(),
    });
    let link = Arc::new(SubscriptionLink::new());
    let subscriber = Arc::new(WaitSubscriber {
        cell: Arc::clone(&cell),
        collected: Mutex::new(Vec::new()),
        link: Arc::clone(&link),
    });
    source.subscribe(subscriber as Arc<dyn Subscriber<T>>);
    (cell, link)
}

struct WaitCell<T> {
    slot: Mutex<Option<Result<Vec<T>, StreamError>>>,
    signal: Condvar,
}

impl<T> WaitCell<T> {
    fn fulfill(&self, result: Result<Vec<T>, StreamError>) {
        {
            let mut slot = self.slot.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(result);
        }
        self.signal.notify_all();
    }
}

struct WaitSubscriber<T> {
    cell: Arc<WaitCell<T>>,
    collected: Mutex<Vec<T>>,
    link: Arc<SubscriptionLink>,
}

impl<T: Send + 'static> Subscriber<T> for WaitSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if self.link.set(subscription) {
            self.link.request(Demand::UNBOUNDED);
        }
    }

    fn on_next(&self, item: T) {
        self.collected.lock().push(item);
    }

    fn on_error(&self, error: StreamError) {
        self.link.clear();
        self.cell.fulfill(Err(error));
    }

    fn on_complete(&self) {
        self.link.clear();
        let items = std::mem::take(&mut *self.collected.lock());
        self.cell.fulfill(Ok(items));
    }
}
