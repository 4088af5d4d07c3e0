//! # Absorbing terminal state machine.
//!
//! Every sequence instance moves through
//! `Unsubscribed → Active → (Completed | Errored | Cancelled)`. Terminal
//! states are absorbing: at most one terminal transition ever succeeds, and
//! races between upstream completion and downstream cancellation resolve
//! first-wins.
//!
//! [`TerminalLatch`] encodes the machine in a single atomic. Each transition
//! method returns `bool` — `true` means this call won the transition and owns
//! the corresponding signal delivery.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No subscriber attached yet.
    Unsubscribed,
    /// Subscribed, signals may flow.
    Active,
    /// Terminated normally.
    Completed,
    /// Terminated with an error.
    Errored,
    /// Terminated by downstream cancellation.
    Cancelled,
}

const UNSUBSCRIBED: u8 = 0;
const ACTIVE: u8 = 1;
const COMPLETED: u8 = 2;
const ERRORED: u8 = 3;
const CANCELLED: u8 = 4;

fn decode(raw: u8) -> StreamState {
    match raw {
        UNSUBSCRIBED => StreamState::Unsubscribed,
        ACTIVE => StreamState::Active,
        COMPLETED => StreamState::Completed,
        ERRORED => StreamState::Errored,
        _ => StreamState::Cancelled,
    }
}

/// Atomic, absorbing state latch.
///
/// # Example
/// ```
/// use multiflow::{StreamState, TerminalLatch};
///
/// let latch = TerminalLatch::active();
/// assert!(latch.complete(), "first terminal transition wins");
/// assert!(!latch.error(), "later transitions lose");
/// assert_eq!(latch.get(), StreamState::Completed);
/// ```
#[derive(Debug)]
pub struct TerminalLatch {
    state: AtomicU8,
}

impl TerminalLatch {
    /// Creates a latch in [`StreamState::Unsubscribed`].
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNSUBSCRIBED),
        }
    }

    /// Creates a latch already in [`StreamState::Active`].
    pub fn active() -> Self {
        Self {
            state: AtomicU8::new(ACTIVE),
        }
    }

    /// Current state.
    pub fn get(&self) -> StreamState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// `Unsubscribed → Active`. Returns `true` if this call transitioned.
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(UNSUBSCRIBED, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Transitions into [`StreamState::Completed`] unless already terminal.
    pub fn complete(&self) -> bool {
        self.terminate(COMPLETED)
    }

    /// Transitions into [`StreamState::Errored`] unless already terminal.
    pub fn error(&self) -> bool {
        self.terminate(ERRORED)
    }

    /// Transitions into [`StreamState::Cancelled`] unless already terminal.
    pub fn cancel(&self) -> bool {
        self.terminate(CANCELLED)
    }

    /// `true` once any terminal transition has happened.
    pub fn is_terminal(&self) -> bool {
        self.state.load(Ordering::Acquire) >= COMPLETED
    }

    /// `true` once the latch was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn terminate(&self, target: u8) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= COMPLETED {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for TerminalLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_activation_happens_once() {
        let latch = TerminalLatch::new();
        assert_eq!(latch.get(), StreamState::Unsubscribed);
        assert!(latch.activate());
        assert!(!latch.activate(), "second activation must lose");
        assert_eq!(latch.get(), StreamState::Active);
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let latch = TerminalLatch::active();
        assert!(latch.error());
        assert!(!latch.complete());
        assert!(!latch.cancel());
        assert_eq!(latch.get(), StreamState::Errored);
        assert!(latch.is_terminal());
    }

    #[test]
    fn test_terminal_allowed_before_activation() {
        // empty() completes without ever being driven by demand
        let latch = TerminalLatch::new();
        assert!(latch.complete());
        assert_eq!(latch.get(), StreamState::Completed);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let latch = TerminalLatch::active();
        assert!(latch.cancel());
        assert!(!latch.cancel(), "second cancel has no observable effect");
        assert!(latch.is_cancelled());
    }

    #[test]
    fn test_exactly_one_terminal_winner_under_race() {
        for _ in 0..100 {
            let latch = Arc::new(TerminalLatch::active());
            let a = {
                let l = Arc::clone(&latch);
                std::thread::spawn(move || l.complete())
            };
            let b = {
                let l = Arc::clone(&latch);
                std::thread::spawn(move || l.cancel())
            };
            let won_a = a.join().expect("complete thread panicked");
            let won_b = b.join().expect("cancel thread panicked");
            assert!(
                won_a ^ won_b,
                "exactly one of complete/cancel must win, got {won_a}/{won_b}"
            );
        }
    }
}
