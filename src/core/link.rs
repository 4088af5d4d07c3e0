//! Upstream-subscription slots used by operator processors.
//!
//! [`SubscriptionLink`] is a single-assignment slot with a monotonic
//! cancelled flag: operators store their upstream subscription in it, and
//! cancellation is safe from any thread at any point of the handshake. A
//! second `set` loses deterministically — the incoming subscription is
//! cancelled, per the single-subscribe rule for processors.
//!
//! [`SubscriptionArbiter`] extends the slot with demand accounting across
//! source switches: operators that replace their upstream mid-flight
//! (`concat`, the resume family) route downstream requests through the
//! arbiter, which replays outstanding demand to each new source. Requests
//! and switches funnel through one wip-serialized grant loop, so each unit
//! of demand reaches exactly one source exactly once, for any interleaving
//! of the consumer and producer threads.
//!
//! Locks are held only to swap the `Arc`; `request`/`cancel` on the held
//! subscription always run outside the lock.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::contract::Subscription;
use crate::core::demand::Demand;

/// Single-assignment upstream subscription slot with idempotent cancel.
pub(crate) struct SubscriptionLink {
    inner: Mutex<Option<Arc<dyn Subscription>>>,
    cancelled: AtomicBool,
}

impl SubscriptionLink {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Stores the upstream subscription.
    ///
    /// Returns `false` (and cancels `subscription`) when the link was already
    /// cancelled or already holds an upstream — the deterministic outcome for
    /// a second `on_subscribe`.
    pub(crate) fn set(&self, subscription: Arc<dyn Subscription>) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            subscription.cancel();
            return false;
        }
        {
            let mut slot = self.inner.lock();
            if slot.is_some() {
                drop(slot);
                subscription.cancel();
                return false;
            }
            *slot = Some(subscription);
        }
        // cancel() may have raced between the flag check and the store
        if self.cancelled.load(Ordering::Acquire) {
            if let Some(current) = self.inner.lock().take() {
                current.cancel();
            }
            return false;
        }
        true
    }

    /// Forwards a request to the held upstream, if any.
    pub(crate) fn request(&self, n: u64) {
        let current = self.inner.lock().clone();
        if let Some(subscription) = current {
            subscription.request(n);
        }
    }

    /// Cancels the held upstream exactly once.
    pub(crate) fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(current) = self.inner.lock().take() {
            current.cancel();
        }
    }

    /// Drops the upstream reference after a terminal signal.
    pub(crate) fn clear(&self) {
        self.inner.lock().take();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Subscription for SubscriptionLink {
    fn request(&self, n: u64) {
        SubscriptionLink::request(self, n);
    }

    fn cancel(&self) {
        SubscriptionLink::cancel(self);
    }
}

/// Subscription slot that carries demand across upstream switches.
///
/// Downstream requests park in `pending` and are folded into the outstanding
/// [`Demand`] by the grant loop; every item the owning operator forwards is
/// accounted with [`Self::produced_one`]. When the operator switches to a new
/// source, the grant loop replays the still-outstanding demand to it, and the
/// fold-before-switch ordering guarantees no unit of demand is both replayed
/// and forwarded.
pub(crate) struct SubscriptionArbiter {
    demand: Demand,
    /// Requested downstream but not yet folded into `demand` or forwarded.
    pending: AtomicU64,
    zero_requested: AtomicBool,
    current: Mutex<Option<Arc<dyn Subscription>>>,
    incoming: Mutex<Option<Arc<dyn Subscription>>>,
    cancelled: AtomicBool,
    wip: AtomicUsize,
}

impl SubscriptionArbiter {
    pub(crate) fn new() -> Self {
        Self {
            demand: Demand::new(),
            pending: AtomicU64::new(0),
            zero_requested: AtomicBool::new(false),
            current: Mutex::new(None),
            incoming: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            wip: AtomicUsize::new(0),
        }
    }

    /// Replaces the active upstream; the grant loop replays outstanding
    /// demand to it.
    pub(crate) fn switch_to(&self, subscription: Arc<dyn Subscription>) {
        if self.cancelled.load(Ordering::Acquire) {
            subscription.cancel();
            return;
        }
        if let Some(superseded) = self.incoming.lock().replace(subscription) {
            superseded.cancel();
        }
        self.drain();
    }

    /// Accounts one item forwarded downstream.
    pub(crate) fn produced_one(&self) {
        self.demand.produced(1);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn add_pending(&self, n: u64) {
        let mut current = self.pending.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(n);
            match self.pending.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
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
        if self.cancelled.load(Ordering::Acquire) {
            let current = self.current.lock().take();
            if let Some(current) = current {
                current.cancel();
            }
            let incoming = self.incoming.lock().take();
            if let Some(incoming) = incoming {
                incoming.cancel();
            }
            return;
        }
        // fold fresh requests into the outstanding counter first: a switch
        // in the same pass replays them once instead of granting them twice
        let fresh = self.pending.swap(0, Ordering::AcqRel);
        if fresh > 0 {
            self.demand.add(fresh);
        }
        let switched = self.incoming.lock().take();
        if let Some(next) = switched {
            *self.current.lock() = Some(Arc::clone(&next));
            let outstanding = self.demand.current();
            if outstanding > 0 {
                next.request(outstanding);
            }
        } else if fresh > 0 {
            let current = self.current.lock().clone();
            if let Some(subscription) = current {
                subscription.request(fresh);
            }
        }
        if self.zero_requested.swap(false, Ordering::AcqRel) {
            // forwarded for the source to reject as a protocol violation
            let current = self.current.lock().clone();
            if let Some(subscription) = current {
                subscription.request(0);
            }
        }
    }
}

impl Subscription for SubscriptionArbiter {
    fn request(&self, n: u64) {
        if n == 0 {
            self.zero_requested.store(true, Ordering::Release);
        } else {
            self.add_pending(n);
        }
        self.drain();
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct Probe {
        requested: AtomicU64,
        request_calls: AtomicU64,
        cancels: AtomicU64,
    }

    impl Probe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requested: AtomicU64::new(0),
                request_calls: AtomicU64::new(0),
                cancels: AtomicU64::new(0),
            })
        }
    }

    impl Subscription for Probe {
        fn request(&self, n: u64) {
            self.request_calls.fetch_add(1, Ordering::SeqCst);
            self.requested.fetch_add(n, Ordering::SeqCst);
        }
        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_link_second_set_cancels_incoming() {
        let link = SubscriptionLink::new();
        let first = Probe::new();
        let second = Probe::new();
        assert!(link.set(first.clone()));
        assert!(!link.set(second.clone()), "second upstream must lose");
        assert_eq!(second.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(first.cancels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_link_cancel_before_set_cancels_late_upstream() {
        let link = SubscriptionLink::new();
        link.cancel();
        let late = Probe::new();
        assert!(!link.set(late.clone()));
        assert_eq!(late.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_link_cancel_is_idempotent() {
        let link = SubscriptionLink::new();
        let upstream = Probe::new();
        assert!(link.set(upstream.clone()));
        link.cancel();
        link.cancel();
        assert_eq!(
            upstream.cancels.load(Ordering::SeqCst),
            1,
            "upstream must see exactly one cancel"
        );
        assert!(link.is_cancelled());
    }

    #[test]
    fn test_arbiter_replays_outstanding_demand_on_switch() {
        let arbiter = SubscriptionArbiter::new();
        let first = Probe::new();
        arbiter.switch_to(first.clone());
        arbiter.request(10);
        assert_eq!(first.requested.load(Ordering::SeqCst), 10);

        // 4 items delivered from the first source
        for _ in 0..4 {
            arbiter.produced_one();
        }
        let second = Probe::new();
        arbiter.switch_to(second.clone());
        assert_eq!(
            second.requested.load(Ordering::SeqCst),
            6,
            "switch must replay only the outstanding demand"
        );
    }

    #[test]
    fn test_arbiter_grants_demand_exactly_once_across_mid_grant_switch() {
        // hands over to the next source from inside its own grant call,
        // the way a member that completes instantly does on the producer side
        struct SwitchingSource {
            arbiter: Arc<SubscriptionArbiter>,
            next: Arc<Probe>,
            switched: AtomicBool,
        }

        impl Subscription for SwitchingSource {
            fn request(&self, _n: u64) {
                if !self.switched.swap(true, Ordering::SeqCst) {
                    self.arbiter
                        .switch_to(Arc::clone(&self.next) as Arc<dyn Subscription>);
                }
            }
            fn cancel(&self) {}
        }

        let arbiter = Arc::new(SubscriptionArbiter::new());
        let next = Probe::new();
        let first = Arc::new(SwitchingSource {
            arbiter: Arc::clone(&arbiter),
            next: Arc::clone(&next),
            switched: AtomicBool::new(false),
        });
        arbiter.switch_to(first);
        arbiter.request(5);
        assert_eq!(
            next.requested.load(Ordering::SeqCst),
            5,
            "the replacement source must see the outstanding demand exactly once"
        );
    }

    #[test]
    fn test_arbiter_forwards_request_zero_to_the_source() {
        let arbiter = SubscriptionArbiter::new();
        let source = Probe::new();
        arbiter.switch_to(source.clone());
        arbiter.request(0);
        assert_eq!(
            source.request_calls.load(Ordering::SeqCst),
            1,
            "the source decides the zero-request violation"
        );
        assert_eq!(source.requested.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arbiter_cancel_reaches_current_and_future_sources() {
        let arbiter = SubscriptionArbiter::new();
        let first = Probe::new();
        arbiter.switch_to(first.clone());
        arbiter.cancel();
        assert_eq!(first.cancels.load(Ordering::SeqCst), 1);

        let second = Probe::new();
        arbiter.switch_to(second.clone());
        assert_eq!(
            second.cancels.load(Ordering::SeqCst),
            1,
            "sources attached after cancel must be cancelled immediately"
        );
    }
}
