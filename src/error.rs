//! Error types used across the sequence engine.
//!
//! The engine funnels every failure into a single [`StreamError`] enum:
//!
//! - failures injected by sources or user code ([`StreamError::Source`],
//!   [`StreamError::Message`]);
//! - panics trapped inside user callbacks ([`StreamError::CallbackPanic`]);
//! - reactive protocol violations ([`StreamError::Protocol`]);
//! - buffer overflow under the `Buffer` policy ([`StreamError::Overflow`]);
//! - blocking-bridge expiry ([`StreamError::AwaitTimeout`]).
//!
//! The type provides helper methods (`as_label`, `as_message`) for
//! logging/metrics and predicates such as [`StreamError::is_overflow`] and
//! [`StreamError::is_timeout`] for dispatching on the failure kind.
//!
//! `StreamError` is `Clone` on purpose: error sources replay their failure to
//! every subscriber, and the delay-error mode of the flatten operator keeps a
//! collected error alive until all sources finish.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// # Terminal failure signal of a sequence.
///
/// Every sequence terminates with at most one `StreamError`. Consumers see it
/// raw through [`Subscriber::on_error`](crate::Subscriber::on_error); the
/// blocking bridge and the [`Stage`](crate::Stage) future surface it as the
/// `Err` arm of their results.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// A typed failure injected by a source or by user code.
    #[error("source failure: {0}")]
    Source(Arc<dyn std::error::Error + Send + Sync>),

    /// A lightweight, message-only failure.
    #[error("{message}")]
    Message {
        /// The failure description.
        message: String,
    },

    /// A user callback (mapper, predicate, consumer, hook) panicked.
    ///
    /// The panic is trapped at the operator boundary and converted into this
    /// terminal signal; it never unwinds through the subscription machinery.
    #[error("callback panicked: {message}")]
    CallbackPanic {
        /// The trapped panic payload, if it was a string.
        message: String,
    },

    /// A reactive protocol violation.
    ///
    /// Raised for a zero-demand `request`, a second subscriber on a
    /// single-subscriber publisher, and similar programming errors. Never
    /// silently swallowed.
    #[error("reactive protocol violation: {message}")]
    Protocol {
        /// What rule was violated.
        message: String,
    },

    /// The `Buffer` overflow policy rejected an emission past capacity.
    #[error("buffer overflow: capacity {capacity} exceeded")]
    Overflow {
        /// The configured buffer capacity that was exceeded.
        capacity: usize,
    },

    /// The blocking bridge timed out before a terminal signal arrived.
    #[error("await timed out after {timeout:?}")]
    AwaitTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl StreamError {
    /// Wraps an arbitrary error value as a source failure.
    ///
    /// # Example
    /// ```
    /// use multiflow::StreamError;
    ///
    /// let err = StreamError::source(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
    /// assert_eq!(err.as_label(), "stream_source");
    /// ```
    pub fn source(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        StreamError::Source(Arc::new(error))
    }

    /// Builds a message-only failure.
    pub fn message(message: impl Into<String>) -> Self {
        StreamError::Message {
            message: message.into(),
        }
    }

    /// Builds a protocol-violation failure.
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        StreamError::Protocol {
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use multiflow::StreamError;
    ///
    /// let err = StreamError::Overflow { capacity: 16 };
    /// assert_eq!(err.as_label(), "stream_overflow");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Source(_) => "stream_source",
            StreamError::Message { .. } => "stream_failed",
            StreamError::CallbackPanic { .. } => "stream_callback_panic",
            StreamError::Protocol { .. } => "stream_protocol",
            StreamError::Overflow { .. } => "stream_overflow",
            StreamError::AwaitTimeout { .. } => "stream_await_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StreamError::Source(e) => format!("source: {e}"),
            StreamError::Message { message } => format!("error: {message}"),
            StreamError::CallbackPanic { message } => format!("panic: {message}"),
            StreamError::Protocol { message } => format!("protocol: {message}"),
            StreamError::Overflow { capacity } => format!("overflow: capacity={capacity}"),
            StreamError::AwaitTimeout { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// `true` when the failure is a `Buffer`-policy capacity overflow.
    pub fn is_overflow(&self) -> bool {
        matches!(self, StreamError::Overflow { .. })
    }

    /// `true` when the failure is a blocking-bridge timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::AwaitTimeout { .. })
    }

    /// `true` when the failure is a reactive protocol violation.
    pub fn is_protocol(&self) -> bool {
        matches!(self, StreamError::Protocol { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(StreamError::message("x").as_label(), "stream_failed");
        assert_eq!(
            StreamError::Overflow { capacity: 4 }.as_label(),
            "stream_overflow"
        );
        assert_eq!(
            StreamError::AwaitTimeout {
                timeout: Duration::from_millis(5)
            }
            .as_label(),
            "stream_await_timeout"
        );
        assert_eq!(StreamError::protocol("x").as_label(), "stream_protocol");
    }

    #[test]
    fn test_predicates() {
        assert!(StreamError::Overflow { capacity: 1 }.is_overflow());
        assert!(!StreamError::message("x").is_overflow());
        assert!(StreamError::AwaitTimeout {
            timeout: Duration::ZERO
        }
        .is_timeout());
        assert!(StreamError::protocol("bad").is_protocol());
    }

    #[test]
    fn test_source_display_includes_cause() {
        let err = StreamError::source(std::io::Error::new(std::io::ErrorKind::Other, "refused"));
        assert!(err.to_string().contains("refused"), "display: {err}");
    }

    #[test]
    fn test_clone_preserves_kind() {
        let err = StreamError::Overflow { capacity: 8 };
        let copy = err.clone();
        assert!(copy.is_overflow());
        assert_eq!(copy.as_message(), err.as_message());
    }
}
