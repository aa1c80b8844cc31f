//! A thread-safe priority queue with an instant lane.
//!
//! Elements enqueued as *instant* bypass priority ordering and are served first, in FIFO order.
//! Everything else is served by priority. Writers are serialized by a spinning admission gate,
//! readers wait for the gate to clear, so batches are observed either completely or not at all.

mod compare;
mod error;
mod gate;
pub mod heap;
mod lane;
mod queue;
pub mod stress;
#[cfg(test)]
mod test;

// region:    --- Exports
pub use compare::{Comparator, NaturalOrder, ReverseOrder};
pub use error::{QueueError, Result};
pub use gate::{EnqueueGate, SpinPolicy};
pub use lane::InstantLane;
pub use queue::{Cfg, ConcurrentPriorityQueue};
// endregion: --- Exports

/// Operations shared by priority queues that support an instant lane.
///
/// Elements enqueued with `instant` set are served before all others, oldest first, and their
/// priority is not used. All other elements are served by priority.
pub trait PriorityQueue<E, P>: Send + Sync {
    fn enqueue(&self, element: E, priority: P, instant: bool);

    fn enqueue_range<I>(&self, elements: I, priority: P, instant: bool)
    where
        I: IntoIterator<Item = E>,
        P: Clone;

    fn enqueue_range_with_priorities<I>(&self, items: I, instant: bool)
    where
        I: IntoIterator<Item = (E, P)>;

    /// Returns a copy of the next element without removing it. Prioritized elements are only
    /// returned if `condition` accepts their priority.
    fn try_peek(&self, condition: impl FnOnce(&P) -> bool) -> Option<E>
    where
        E: Clone;

    fn try_dequeue(&self) -> Option<E>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dequeues up to `n` elements in service order.
    fn drain(&self, n: usize) -> Vec<E>;
}
