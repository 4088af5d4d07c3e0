//! Future view of a sequence's terminal outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::core::{Demand, Subscriber, Subscription, SubscriptionLink};
use crate::error::StreamError;
use crate::multi::Multi;

/// Future resolving with the terminal outcome of a sequence.
///
/// Dropping the stage before it resolves cancels the subscription.
pub struct Stage<V> {
    receiver: oneshot::Receiver<Result<V, StreamError>>,
    link: Arc<SubscriptionLink>,
}

impl<V> Future for Stage<V> {
    type Output = Result<V, StreamError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(StreamError::protocol(
                    "subscription dropped without a terminal signal",
                ))
            })
        })
    }
}

impl<V> Drop for Stage<V> {
    fn drop(&mut self) {
        self.link.cancel();
    }
}

type FinishFn<T, V> = Box<dyn FnOnce(Vec<T>) -> V + Send>;

/// Subscribes with unbounded demand and resolves the stage with
/// `finish(items)` on completion, or the error as-is.
pub(crate) fn stage_with<T, V>(
    source: &Multi<T>,
    finish: impl FnOnce(Vec<T>) -> V + Send + 'static,
) -> Stage<V>
where
    T: Send + 'static,
    V: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let link = Arc::new(SubscriptionLink::new());
    let subscriber = Arc::new(StageSubscriber {
        sink: Mutex::new(Some((sender, Box::new(finish) as FinishFn<T, V>))),
        collected: Mutex::new(Vec::new()),
        link: Arc::clone(&link),
    });
    source.subscribe(subscriber as Arc<dyn Subscriber<T>>);
    Stage { receiver, link }
}

struct StageSubscriber<T, V> {
    sink: Mutex<Option<(oneshot::Sender<Result<V, StreamError>>, FinishFn<T, V>)>>,
    collected: Mutex<Vec<T>>,
    link: Arc<SubscriptionLink>,
}

impl<T: Send + 'static, V: Send + 'static> Subscriber<T> for StageSubscriber<T, V> {
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
        if let Some((sender, _)) = self.sink.lock().take() {
            let _ = sender.send(Err(error));
        }
    }

    fn on_complete(&self) {
        self.link.clear();
        if let Some((sender, finish)) = self.sink.lock().take() {
            let items = std::mem::take(&mut *self.collected.lock());
            let _ = sender.send(Ok(finish(items)));
        }
    }
}
