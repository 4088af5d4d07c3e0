//! 1:1 mapping processor.
//!
//! Demand passes through unchanged, so the downstream subscriber talks to the
//! upstream subscription directly (via the link, which also gives the
//! processor a cancel handle for the mapper-failure path). A panicking mapper
//! converts to a terminal error and cancels upstream.

use std::sync::Arc;

use crate::core::{trap, Subscriber, Subscription, SubscriptionLink, TerminalLatch};
use crate::error::StreamError;

pub(crate) struct MapProcessor<T, R> {
    mapper: Arc<dyn Fn(T) -> R + Send + Sync>,
    downstream: Arc<dyn Subscriber<R>>,
    upstream: Arc<SubscriptionLink>,
    state: TerminalLatch,
}

impl<T: Send + 'static, R: Send + 'static> MapProcessor<T, R> {
    pub(crate) fn create(
        downstream: Arc<dyn Subscriber<R>>,
        mapper: Arc<dyn Fn(T) -> R + Send + Sync>,
    ) -> Arc<dyn Subscriber<T>> {
        Arc::new(Self {
            mapper,
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

impl<T: Send + 'static, R: Send + 'static> Subscriber<T> for MapProcessor<T, R> {
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
        match trap(|| (self.mapper)(item)) {
            Ok(mapped) => self.downstream.on_next(mapped),
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
    fn test_map_transforms_items() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 4).map(|n| n * 10).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![10, 20, 30, 40]);
        assert!(recorder.completed());
    }

    #[test]
    fn test_map_forwards_demand_unchanged() {
        let recorder = Recorder::with_request(2);
        Multi::range(1, 10).map(|n| n + 1).subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![2, 3]);
        assert!(recorder.terminal().is_none());
    }

    #[test]
    fn test_mapper_panic_becomes_terminal_error() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 10)
            .map(|n| {
                if n == 3 {
                    panic!("bad item");
                }
                n
            })
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec![1, 2], "items before the panic flow");
        let err = recorder.error().expect("panic must surface as error");
        assert_eq!(err.as_label(), "stream_callback_panic");
    }

    #[test]
    fn test_map_can_change_type() {
        let recorder = Recorder::unbounded();
        Multi::range(1, 3)
            .map(|n| format!("#{n}"))
            .subscribe(recorder.clone());
        assert_eq!(recorder.items(), vec!["#1", "#2", "#3"]);
    }
}
