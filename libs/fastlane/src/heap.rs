//! Binary min-heap of `(element, priority)` pairs ordered by a [`Comparator`].
//!
//! [`std::collections::BinaryHeap`] needs the ordering to live in `Ord`, which rules out a
//! comparator chosen at runtime, so the sift operations are implemented here on a plain `Vec`.
//! The heap itself is not synchronized; the queue only touches it while holding its lock.

use crate::compare::Comparator;
use crate::error::{QueueError, Result};

#[derive(Debug)]
pub struct PriorityCore<E, P, C> {
    /// Heap-ordered entries: the entry at index 0 holds the priority served first.
    entries: Vec<(E, P)>,
    comparator: C,
}

impl<E, P, C: Comparator<P>> PriorityCore<E, P, C> {
    pub fn new(comparator: C) -> Self {
        Self {
            entries: Vec::new(),
            comparator,
        }
    }

    /// Creates a heap that can hold `capacity` entries without reallocating.
    ///
    /// # Error
    /// Returns [`QueueError::InvalidConfiguration`] if the allocation size overflows.
    pub fn with_capacity(capacity: usize, comparator: C) -> Result<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::capacity_overflow(capacity))?;
        Ok(Self {
            entries,
            comparator,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Inserts `element`.
    ///
    /// Every comparison is made before the heap is touched, so a panicking comparator leaves the
    /// heap as it was and drops `element`.
    pub fn push(&mut self, element: E, priority: P) {
        let slot = self.rising_slot(&priority);
        let tail = self.entries.len();
        self.entries.push((element, priority));
        self.raise(tail, slot);
    }

    /// Inserts every element of `elements` with a copy of the shared `priority`.
    pub fn extend_with_priority<I>(&mut self, elements: I, priority: P)
    where
        I: IntoIterator<Item = E>,
        P: Clone,
    {
        self.extend(elements.into_iter().map(|element| (element, priority.clone())));
    }

    /// Inserts all `items` or, if the comparator or the iterator panics, none of them.
    pub fn extend<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (E, P)>,
    {
        let items = items.into_iter();
        self.entries.reserve(items.size_hint().0);

        let mut batch = Batch {
            core: self,
            slots: Vec::new(),
        };
        for (element, priority) in items {
            let slot = batch.core.rising_slot(&priority);
            let tail = batch.core.entries.len();
            batch.core.entries.push((element, priority));
            batch.core.raise(tail, slot);
            batch.slots.push(slot);
        }
        batch.slots.clear();
    }

    pub fn peek(&self) -> Option<(&E, &P)> {
        self.entries
            .first()
            .map(|(element, priority)| (element, priority))
    }

    /// Removes the entry with the priority that compares least.
    ///
    /// Like [`push`](Self::push), a panicking comparator leaves the heap untouched.
    pub fn pop(&mut self) -> Option<(E, P)> {
        let last = self.entries.len().checked_sub(1)?;
        let slot = self.sinking_slot(last);
        self.entries.swap(0, last);
        let top = self.entries.pop();
        self.sink(0, slot);
        top
    }

    fn precedes(&self, a: &P, b: &P) -> bool {
        self.comparator.compare(a, b).is_lt()
    }

    /// Index a new entry with `priority` settles at once appended; compares only.
    fn rising_slot(&self, priority: &P) -> usize {
        let mut idx = self.entries.len();
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.precedes(priority, &self.entries[parent].1) {
                break;
            }
            idx = parent;
        }
        idx
    }

    /// Index the entry at `last` settles at once it replaces the root; compares only.
    fn sinking_slot(&self, last: usize) -> usize {
        let moving = &self.entries[last].1;
        let mut hole = 0;
        loop {
            let left = 2 * hole + 1;
            if left >= last {
                break;
            }
            let right = left + 1;
            let child = if right < last
                && self.precedes(&self.entries[right].1, &self.entries[left].1)
            {
                right
            } else {
                left
            };
            if !self.precedes(&self.entries[child].1, moving) {
                break;
            }
            hole = child;
        }
        hole
    }
}

// Moves along a root-to-leaf path. Swaps only, nothing here can panic.
impl<E, P, C> PriorityCore<E, P, C> {
    /// Moves the entry at `from` up to its ancestor `to`, shifting the path below down one level.
    fn raise(&mut self, mut from: usize, to: usize) {
        while from > to {
            let parent = (from - 1) / 2;
            self.entries.swap(from, parent);
            from = parent;
        }
    }

    /// Moves the entry at `from` down to its descendant `to`, shifting the path up one level.
    fn sink(&mut self, from: usize, to: usize) {
        // With 1-based indices every node on the path is a bit prefix of `to + 1`.
        let target = to + 1;
        let levels = target.ilog2() - (from + 1).ilog2();
        let mut hole = from;
        for shift in (0..levels).rev() {
            let next = (target >> shift) - 1;
            self.entries.swap(hole, next);
            hole = next;
        }
    }
}

/// Undoes the insertions of an unfinished [`PriorityCore::extend`] when dropped.
struct Batch<'a, E, P, C> {
    core: &'a mut PriorityCore<E, P, C>,
    /// Slot every inserted entry rose to, in insertion order.
    slots: Vec<usize>,
}

impl<E, P, C> Drop for Batch<'_, E, P, C> {
    fn drop(&mut self) {
        while let Some(slot) = self.slots.pop() {
            let last = self.core.entries.len() - 1;
            self.core.sink(slot, last);
            self.core.entries.pop();
        }
    }
}
