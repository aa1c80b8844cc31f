use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors raised while setting up a [`ConcurrentPriorityQueue`](crate::ConcurrentPriorityQueue).
///
/// A running queue never fails: an empty queue is reported as `None` by the read operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("invalid queue configuration (capacity {capacity}): {reason}")]
    InvalidConfiguration {
        capacity: i128,
        reason: &'static str,
    },
}

impl QueueError {
    pub(crate) fn invalid_capacity(capacity: i128) -> Self {
        Self::InvalidConfiguration {
            capacity,
            reason: "capacity must be a non-negative integer",
        }
    }

    pub(crate) fn capacity_overflow(capacity: usize) -> Self {
        Self::InvalidConfiguration {
            capacity: capacity as i128,
            reason: "capacity exceeds what can be allocated",
        }
    }
}
