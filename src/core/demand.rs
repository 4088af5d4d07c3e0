//! # Saturating atomic demand counter.
//!
//! [`Demand`] implements the Reactive Streams request arithmetic: cumulative
//! additions saturate at the [`Demand::UNBOUNDED`] sentinel, production
//! subtracts but never below zero, and an unbounded counter stays unbounded
//! forever.
//!
//! The counter is the only demand state a subscription needs; drain loops
//! read it with [`Demand::current`] and account delivered items with
//! [`Demand::produced`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-subscription outstanding request counter.
///
/// # Example
/// ```
/// use multiflow::Demand;
///
/// let demand = Demand::new();
/// demand.add(3);
/// assert_eq!(demand.current(), 3);
///
/// demand.produced(2);
/// assert_eq!(demand.current(), 1);
///
/// demand.add(Demand::UNBOUNDED);
/// assert!(demand.is_unbounded());
/// ```
#[derive(Debug)]
pub struct Demand {
    requested: AtomicU64,
}

impl Demand {
    /// Sentinel for "effectively unbounded" demand.
    ///
    /// Adding anything to an unbounded counter keeps it unbounded, and
    /// production does not decrement it.
    pub const UNBOUNDED: u64 = u64::MAX;

    /// Creates a counter with zero outstanding demand.
    pub fn new() -> Self {
        Self {
            requested: AtomicU64::new(0),
        }
    }

    /// Creates a counter already in unbounded mode.
    pub fn unbounded() -> Self {
        Self {
            requested: AtomicU64::new(Self::UNBOUNDED),
        }
    }

    /// Adds `n` to the outstanding demand, saturating at [`Self::UNBOUNDED`].
    ///
    /// Returns the previous value, which lets callers detect the 0 → n
    /// transition that must kick a drain loop.
    pub fn add(&self, n: u64) -> u64 {
        let mut current = self.requested.load(Ordering::Acquire);
        loop {
            if current == Self::UNBOUNDED {
                return current;
            }
            let next = current.saturating_add(n);
            match self.requested.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => return previous,
                Err(observed) => current = observed,
            }
        }
    }

    /// Accounts `n` delivered items.
    ///
    /// Subtracts without going below zero; a no-op in unbounded mode.
    pub fn produced(&self, n: u64) {
        let mut current = self.requested.load(Ordering::Acquire);
        loop {
            if current == Self::UNBOUNDED {
                return;
            }
            let next = current.saturating_sub(n);
            match self.requested.compare_exchange_weak(
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

    /// Current outstanding demand.
    pub fn current(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }

    /// `true` once the counter has saturated at [`Self::UNBOUNDED`].
    pub fn is_unbounded(&self) -> bool {
        self.current() == Self::UNBOUNDED
    }
}

impl Default for Demand {
    fn default() -> Self {
        Self::new()
    }
}
