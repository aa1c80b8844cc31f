use std::collections::VecDeque;

use parking_lot::Mutex;

/// FIFO of elements that skip priority ordering altogether.
///
/// The lane synchronizes itself, independently from the lock that guards the priority heap.
#[derive(Debug)]
pub struct InstantLane<E> {
    items: Mutex<VecDeque<E>>,
}

impl<E> Default for InstantLane<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InstantLane<E> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, element: E) {
        self.items.lock().push_back(element);
    }

    /// Appends all `elements` under a single lock acquisition, so they end up contiguous in the
    /// lane even when other producers push at the same time.
    ///
    /// The iterator is drained while the lane is locked; it must not touch this lane itself.
    pub fn push_batch<I>(&self, elements: I)
    where
        I: IntoIterator<Item = E>,
    {
        self.items.lock().extend(elements);
    }

    pub fn try_pop(&self) -> Option<E> {
        self.items.lock().pop_front()
    }

    /// Applies `f` to the oldest element without removing it.
    pub fn peek_with<R>(&self, f: impl FnOnce(&E) -> R) -> Option<R> {
        self.items.lock().front().map(f)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
