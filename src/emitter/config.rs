//! Emitter buffer configuration.

/// What happens when an emission arrives at a full buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Grow up to capacity; exceeding it fails the publisher with
    /// [`StreamError::Overflow`](crate::StreamError::Overflow) and discards
    /// the buffer.
    Buffer,
    /// Keep the newest `capacity` items: the oldest buffered item is evicted
    /// silently. Never errors.
    Latest,
}

/// Buffer policy and capacity for a [`BufferedEmitter`](crate::BufferedEmitter).
///
/// The default is `Buffer` with an effectively unbounded capacity. Capacity
/// is clamped to at least 1.
///
/// # Example
/// ```
/// use multiflow::{BufferPolicy, EmitterConfig};
///
/// let cfg = EmitterConfig::latest(3);
/// assert_eq!(cfg.policy, BufferPolicy::Latest);
/// assert_eq!(cfg.capacity, 3);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EmitterConfig {
    /// Overflow behavior.
    pub policy: BufferPolicy,
    /// Maximum buffered items.
    pub capacity: usize,
}

impl EmitterConfig {
    /// `Buffer` policy with the given capacity.
    pub fn buffer(capacity: usize) -> Self {
        Self {
            policy: BufferPolicy::Buffer,
            capacity: capacity.max(1),
        }
    }

    /// `Latest` (drop-oldest) policy with the given capacity.
    pub fn latest(capacity: usize) -> Self {
        Self {
            policy: BufferPolicy::Latest,
            capacity: capacity.max(1),
        }
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            policy: BufferPolicy::Buffer,
            capacity: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unbounded_buffer() {
        let cfg = EmitterConfig::default();
        assert_eq!(cfg.policy, BufferPolicy::Buffer);
        assert_eq!(cfg.capacity, usize::MAX);
    }

    #[test]
    fn test_capacity_is_clamped() {
        assert_eq!(EmitterConfig::buffer(0).capacity, 1);
        assert_eq!(EmitterConfig::latest(0).capacity, 1);
    }
}
