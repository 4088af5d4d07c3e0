//! Buffered manual-push publisher.
//!
//! ## Contract
//! - Items emitted before a subscriber attaches, or faster than demand, are
//!   buffered per the configured [`BufferPolicy`].
//! - `complete()` is lazy: the buffer drains first, then the completion is
//!   delivered. `fail()` is eager: the buffer is discarded and the error
//!   delivered as soon as a subscriber is there to receive it.
//! - Exactly one subscriber; a second one is terminated immediately with a
//!   protocol error. This publisher is a live resource, not a cold sequence —
//!   the one place the crate's independent-replay policy does not apply.
//! - `emit`/`complete`/`fail` and the consumer's `request`/`cancel` may run
//!   concurrently on different threads; delivery is serialized by a
//!   wip-counter drain and retained items arrive in emission order.
//!
//! The `Latest` policy is the crate's sole documented exemption from the
//! never-over-buffer rule: eviction replaces delivery, it never over-delivers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{
    trap, Demand, Publisher, StreamState, Subscriber, Subscription, TerminalLatch,
    TerminatedSubscription,
};
use crate::emitter::config::{BufferPolicy, EmitterConfig};
use crate::error::StreamError;
use crate::multi::Multi;

/// Cheap-clone producer handle over a buffered publisher.
///
/// # Example
/// ```
/// use multiflow::{BufferedEmitter, EmitterConfig};
///
/// let emitter = BufferedEmitter::new(EmitterConfig::latest(3));
/// for n in 1..=5 {
///     emitter.emit(n);
/// }
/// emitter.complete();
///
/// // capacity 3, drop-oldest: only the newest three survive
/// assert_eq!(emitter.multi().wait().unwrap(), vec![3, 4, 5]);
/// ```
pub struct BufferedEmitter<T> {
    core: Arc<EmitterCore<T>>,
}

impl<T> Clone for BufferedEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + 'static> BufferedEmitter<T> {
    /// Creates an emitter with the given buffer policy and capacity.
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            core: Arc::new(EmitterCore {
                policy: config.policy,
                capacity: config.capacity.max(1),
                queue: Mutex::new(VecDeque::new()),
                demand: Demand::new(),
                state: TerminalLatch::new(),
                completing: AtomicBool::new(false),
                failed: AtomicBool::new(false),
                failure: Mutex::new(None),
                downstream: Mutex::new(None),
                attached: AtomicBool::new(false),
                wip: AtomicUsize::new(0),
            }),
        }
    }

    /// Offers one item.
    ///
    /// Returns `false` once the emitter is closed (completed, failed or
    /// cancelled) or when a `Buffer`-policy overflow rejected the item — the
    /// overflow also fails the publisher. Under `Latest` the item is always
    /// accepted, evicting the oldest buffered one if needed.
    pub fn emit(&self, item: T) -> bool {
        self.core.emit(item)
    }

    /// Requests completion. Buffered items drain first; the completion
    /// signal follows the last of them.
    pub fn complete(&self) {
        self.core.complete();
    }

    /// Fails the publisher. Eager: buffered items are discarded and the
    /// error is delivered as the terminal signal.
    pub fn fail(&self, error: StreamError) {
        self.core.fail(error);
    }

    /// Number of currently buffered items.
    pub fn len(&self) -> usize {
        self.core.queue.lock().len()
    }

    /// `true` when no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.core.queue.lock().is_empty()
    }

    /// Outstanding downstream demand.
    pub fn requested(&self) -> u64 {
        self.core.demand.current()
    }

    /// Delivery-side lifecycle state.
    pub fn state(&self) -> StreamState {
        self.core.state.get()
    }

    /// `true` once no further emissions will be accepted.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// The consumer side of this emitter.
    pub fn multi(&self) -> Multi<T> {
        Multi::wrap(Arc::new(EmitterPublisher {
            core: Arc::clone(&self.core),
        }))
    }
}

struct EmitterCore<T> {
    policy: BufferPolicy,
    capacity: usize,
    queue: Mutex<VecDeque<T>>,
    demand: Demand,
    state: TerminalLatch,
    completing: AtomicBool,
    failed: AtomicBool,
    failure: Mutex<Option<StreamError>>,
    downstream: Mutex<Option<Arc<dyn Subscriber<T>>>>,
    attached: AtomicBool,
    wip: AtomicUsize,
}

impl<T: Send + 'static> EmitterCore<T> {
    fn is_closed(&self) -> bool {
        self.completing.load(Ordering::Acquire)
            || self.failed.load(Ordering::Acquire)
            || self.state.is_terminal()
    }

    fn emit(&self, item: T) -> bool {
        if self.is_closed() {
            return false;
        }
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                match self.policy {
                    BufferPolicy::Latest => {
                        queue.pop_front();
                        queue.push_back(item);
                    }
                    BufferPolicy::Buffer => {
                        drop(queue);
                        self.fail(StreamError::Overflow {
                            capacity: self.capacity,
                        });
                        return false;
                    }
                }
            } else {
                queue.push_back(item);
            }
        }
        self.drain();
        true
    }

    fn complete(&self) {
        if self.failed.load(Ordering::Acquire) || self.state.is_terminal() {
            return;
        }
        self.completing.store(true, Ordering::Release);
        self.drain();
    }

    fn fail(&self, error: StreamError) {
        if self.completing.load(Ordering::Acquire) || self.failed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.lock().clear();
        *self.failure.lock() = Some(error);
        self.drain();
    }

    fn cancel(&self) {
        if self.state.cancel() {
            self.queue.lock().clear();
            self.downstream.lock().take();
        }
    }

    fn protocol_violation(&self) {
        if self.completing.load(Ordering::Acquire) || self.failed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.lock().clear();
        *self.failure.lock() = Some(StreamError::protocol("request amount must be positive"));
        self.drain();
    }

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
        let Some(down) = self.downstream.lock().clone() else {
            return;
        };
        if self.state.is_cancelled() {
            return;
        }
        if self.failed.load(Ordering::Acquire) {
            if self.state.error() {
                let error = self
                    .failure
                    .lock()
                    .take()
                    .unwrap_or_else(|| StreamError::message("emitter failed"));
                down.on_error(error);
                self.downstream.lock().take();
            }
            return;
        }
        loop {
            if self.demand.current() == 0 {
                break;
            }
            let item = self.queue.lock().pop_front();
            let Some(value) = item else {
                break;
            };
            self.demand.produced(1);
            down.on_next(value);
            if self.state.is_terminal() {
                return;
            }
        }
        if self.completing.load(Ordering::Acquire)
            && self.queue.lock().is_empty()
            && self.state.complete()
        {
            down.on_complete();
            self.downstream.lock().take();
        }
    }
}

struct EmitterPublisher<T> {
    core: Arc<EmitterCore<T>>,
}

impl<T: Send + 'static> Publisher<T> for EmitterPublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        if self.core.attached.swap(true, Ordering::AcqRel) {
            subscriber.on_subscribe(Arc::new(TerminatedSubscription));
            subscriber.on_error(StreamError::protocol(
                "emitter supports a single subscriber",
            ));
            return;
        }
        *self.core.downstream.lock() = Some(Arc::clone(&subscriber));
        self.core.state.activate();
        subscriber.on_subscribe(Arc::new(EmitterSubscription {
            core: Arc::clone(&self.core),
        }));
        // deliver anything buffered (or an early failure) right away
        self.core.drain();
    }
}

struct EmitterSubscription<T> {
    core: Arc<EmitterCore<T>>,
}

impl<T: Send + 'static> Subscription for EmitterSubscription<T> {
    fn request(&self, n: u64) {
        if self.core.state.is_terminal() {
            return;
        }
        if n == 0 {
            self.core.protocol_violation();
            return;
        }
        self.core.demand.add(n);
        self.core.drain();
    }

    fn cancel(&self) {
        self.core.cancel();
    }
}

/// Per-subscriber emitter factory behind `Multi::create`.
pub(crate) struct CreateSource<T> {
    callback: Arc<dyn Fn(BufferedEmitter<T>) + Send + Sync>,
}

impl<T: Send + 'static> CreateSource<T> {
    pub(crate) fn new(callback: Arc<dyn Fn(BufferedEmitter<T>) + Send + Sync>) -> Self {
        Self { callback }
    }
}

impl<T: Send + 'static> Publisher<T> for CreateSource<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let emitter = BufferedEmitter::new(EmitterConfig::default());
        emitter.multi().subscribe(subscriber);
        if let Err(e) = trap(|| (self.callback)(emitter.clone())) {
            emitter.fail(e);
        }
    }
}
