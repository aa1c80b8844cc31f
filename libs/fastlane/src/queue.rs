use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    PriorityQueue,
    compare::{Comparator, NaturalOrder},
    error::{QueueError, Result},
    gate::{EnqueueGate, SpinPolicy},
    heap::PriorityCore,
    lane::InstantLane,
};

/// Construction parameters of a [`ConcurrentPriorityQueue`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Cfg {
    /// Number of prioritized elements to allocate room for up front.
    /// The queue grows past it as needed. Negative values are rejected.
    pub capacity: Option<i64>,
    /// How enqueuing and reading threads wait for the admission gate.
    pub spin: SpinPolicy,
}

/// Thread-safe priority queue with an instant lane.
///
/// Elements enqueued as `instant` go to a FIFO lane that is always served before any
/// prioritized element. All other elements are served by their priority as ordered by `C`:
/// the priority that compares least comes first.
///
/// Writers pass a spinning admission gate one at a time; readers wait until the gate is clear
/// before looking at the queue, so a batch is never observed half-applied. Under sustained
/// writer contention readers may spin for a long time.
#[derive(Debug)]
pub struct ConcurrentPriorityQueue<E, P, C = NaturalOrder> {
    instant: InstantLane<E>,
    core: Mutex<PriorityCore<E, P, C>>,
    gate: EnqueueGate,
}

impl<E, P: Ord> Default for ConcurrentPriorityQueue<E, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, P: Ord> ConcurrentPriorityQueue<E, P> {
    /// Creates a queue that serves the lowest priority first.
    pub fn new() -> Self {
        Self::assemble(PriorityCore::new(NaturalOrder), SpinPolicy::default())
    }

    /// Creates a queue that serves the lowest priority first and has room for `capacity`
    /// prioritized elements.
    ///
    /// # Error
    /// Returns [`QueueError::InvalidConfiguration`] for negative or unallocatable capacities.
    pub fn with_capacity<N>(capacity: N) -> Result<Self>
    where
        N: TryInto<usize> + TryInto<i128> + Copy,
    {
        Self::with_capacity_and_comparator(capacity, NaturalOrder)
    }
}

impl<E, P, C: Comparator<P>> ConcurrentPriorityQueue<E, P, C> {
    pub fn with_comparator(comparator: C) -> Self {
        Self::assemble(PriorityCore::new(comparator), SpinPolicy::default())
    }

    pub fn with_capacity_and_comparator<N>(capacity: N, comparator: C) -> Result<Self>
    where
        N: TryInto<usize> + TryInto<i128> + Copy,
    {
        let core = PriorityCore::with_capacity(checked_capacity(capacity)?, comparator)?;
        Ok(Self::assemble(core, SpinPolicy::default()))
    }

    pub fn from_cfg(cfg: Cfg, comparator: C) -> Result<Self> {
        let core = match cfg.capacity {
            Some(capacity) => PriorityCore::with_capacity(checked_capacity(capacity)?, comparator)?,
            None => PriorityCore::new(comparator),
        };
        Ok(Self::assemble(core, cfg.spin))
    }

    fn assemble(core: PriorityCore<E, P, C>, spin: SpinPolicy) -> Self {
        debug!(capacity = core.capacity(), %spin, "created priority queue");
        Self {
            instant: InstantLane::new(),
            core: Mutex::new(core),
            gate: EnqueueGate::new(spin),
        }
    }

    pub fn spin_policy(&self) -> SpinPolicy {
        self.gate.policy()
    }

    /// Adds `element` to the queue.
    ///
    /// With `instant` set the element is put on the instant lane and `priority` is dropped,
    /// exactly like an instant batch; it never enters the prioritized heap.
    pub fn enqueue(&self, element: E, priority: P, instant: bool) {
        self.gate.admit_and_run(|| {
            if instant {
                self.instant.push(element);
                return;
            }
            self.core.lock().push(element, priority);
        });
    }

    /// Adds all `elements` with the same `priority`, or all to the instant lane.
    ///
    /// Readers see either none or all of the batch. `elements` is consumed while the writer
    /// holds admission, so the iterator must not call back into this queue.
    pub fn enqueue_range<I>(&self, elements: I, priority: P, instant: bool)
    where
        I: IntoIterator<Item = E>,
        P: Clone,
    {
        self.gate.admit_and_run(|| {
            trace!(instant, "enqueueing batch with shared priority");
            if instant {
                self.instant.push_batch(elements);
                return;
            }
            self.core.lock().extend_with_priority(elements, priority);
        });
    }

    /// Adds all `(element, priority)` pairs, or all elements to the instant lane, in which case
    /// the priorities are dropped.
    ///
    /// Same atomicity as [`Self::enqueue_range`].
    pub fn enqueue_range_with_priorities<I>(&self, items: I, instant: bool)
    where
        I: IntoIterator<Item = (E, P)>,
    {
        self.gate.admit_and_run(|| {
            trace!(instant, "enqueueing batch with individual priorities");
            if instant {
                self.instant
                    .push_batch(items.into_iter().map(|(element, _)| element));
                return;
            }
            self.core.lock().extend(items);
        });
    }

    /// Returns a copy of the element that [`Self::try_dequeue`] would return next, without
    /// removing it.
    ///
    /// An element of the instant lane is returned right away; `condition` is only asked about
    /// the priority of a prioritized element. If it rejects, `None` is returned.
    pub fn try_peek(&self, condition: impl FnOnce(&P) -> bool) -> Option<E>
    where
        E: Clone,
    {
        self.gate.wait_unoccupied();
        if let Some(element) = self.instant.peek_with(E::clone) {
            return Some(element);
        }

        let core = self.core.lock();
        let (element, priority) = core.peek()?;
        condition(priority).then(|| element.clone())
    }

    /// Removes the oldest element of the instant lane or, if there is none, the element with
    /// the priority that compares least.
    pub fn try_dequeue(&self) -> Option<E> {
        self.gate.wait_unoccupied();
        if let Some(element) = self.instant.try_pop() {
            return Some(element);
        }
        self.core.lock().pop().map(|(element, _)| element)
    }

    /// Dequeues up to `n` elements in service order.
    pub fn drain(&self, n: usize) -> Vec<E> {
        let mut items = Vec::with_capacity(n.min(self.len()));
        for _ in 0..n {
            let Some(element) = self.try_dequeue() else {
                break;
            };
            items.push(element);
        }
        items
    }

    /// Number of queued elements over both lanes.
    /// Only a snapshot when other threads use the queue at the same time.
    pub fn len(&self) -> usize {
        self.gate.wait_unoccupied();
        self.instant.len() + self.core.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E, P, C> PriorityQueue<E, P> for ConcurrentPriorityQueue<E, P, C>
where
    E: Send,
    P: Send,
    C: Comparator<P>,
{
    fn enqueue(&self, element: E, priority: P, instant: bool) {
        ConcurrentPriorityQueue::enqueue(self, element, priority, instant);
    }

    fn enqueue_range<I>(&self, elements: I, priority: P, instant: bool)
    where
        I: IntoIterator<Item = E>,
        P: Clone,
    {
        ConcurrentPriorityQueue::enqueue_range(self, elements, priority, instant);
    }

    fn enqueue_range_with_priorities<I>(&self, items: I, instant: bool)
    where
        I: IntoIterator<Item = (E, P)>,
    {
        ConcurrentPriorityQueue::enqueue_range_with_priorities(self, items, instant);
    }

    fn try_peek(&self, condition: impl FnOnce(&P) -> bool) -> Option<E>
    where
        E: Clone,
    {
        ConcurrentPriorityQueue::try_peek(self, condition)
    }

    fn try_dequeue(&self) -> Option<E> {
        ConcurrentPriorityQueue::try_dequeue(self)
    }

    fn len(&self) -> usize {
        ConcurrentPriorityQueue::len(self)
    }

    fn drain(&self, n: usize) -> Vec<E> {
        ConcurrentPriorityQueue::drain(self, n)
    }
}

fn checked_capacity<N>(capacity: N) -> Result<usize>
where
    N: TryInto<usize> + TryInto<i128> + Copy,
{
    TryInto::<usize>::try_into(capacity).map_err(|_| {
        // Only unsigned values beyond `i128::MAX` fail both conversions.
        let reported = TryInto::<i128>::try_into(capacity).unwrap_or(i128::MAX);
        QueueError::invalid_capacity(reported)
    })
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{AssertUnwindSafe, catch_unwind},
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        thread,
    };

    use super::{Cfg, ConcurrentPriorityQueue};
    use crate::{QueueError, ReverseOrder, SpinPolicy};

    #[test]
    fn dequeues_by_ascending_priority() {
        let queue = ConcurrentPriorityQueue::new();
        queue.enqueue("A", 5, false);
        queue.enqueue("B", 1, false);
        queue.enqueue("C", 3, false);

        assert_eq!(queue.try_dequeue(), Some("B"));
        assert_eq!(queue.try_dequeue(), Some("C"));
        assert_eq!(queue.try_dequeue(), Some("A"));
        assert_eq!(queue.try_dequeue(), None);
    }

    /// An instant element is served first and exactly once, whatever its priority.
    #[test]
    fn instant_element_jumps_the_queue() {
        for z_priority in [0, 5, 10] {
            let queue = ConcurrentPriorityQueue::new();
            queue.enqueue("A", 5, false);
            queue.enqueue("Z", z_priority, true);

            assert_eq!(queue.try_dequeue(), Some("Z"));
            assert_eq!(queue.try_dequeue(), Some("A"));
            assert_eq!(queue.try_dequeue(), None);
        }
    }

    #[test]
    fn negative_capacity_is_rejected() {
        let res = ConcurrentPriorityQueue::<&str, u32>::with_capacity(-1);
        match res {
            Err(QueueError::InvalidConfiguration { capacity, .. }) => assert_eq!(capacity, -1),
            Ok(_) => panic!("queue must not be created with a negative capacity"),
        }

        let cfg = Cfg {
            capacity: Some(-7),
            spin: SpinPolicy::Busy,
        };
        assert!(ConcurrentPriorityQueue::<&str, u32, _>::from_cfg(cfg, ReverseOrder).is_err());
    }

    #[test]
    fn capacity_is_only_a_hint() {
        let queue = ConcurrentPriorityQueue::with_capacity(2u8).unwrap();
        queue.enqueue_range_with_priorities((0..10).map(|i| (i, 10 - i)), false);

        assert_eq!(queue.len(), 10);
        assert_eq!(queue.drain(3), vec![9, 8, 7]);
    }

    #[test]
    fn instant_batches_skip_priorities() {
        let queue = ConcurrentPriorityQueue::new();
        queue.enqueue("prio", 0, false);
        queue.enqueue_range(["i1", "i2"], 99, true);
        queue.enqueue_range_with_priorities([("i3", 50), ("i4", 1)], true);

        assert_eq!(queue.len(), 5);
        assert_eq!(queue.drain(10), vec!["i1", "i2", "i3", "i4", "prio"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn peek_reports_next_element() {
        let queue = ConcurrentPriorityQueue::new();
        queue.enqueue_range_with_priorities([("x", 3), ("y", 2)], false);

        assert_eq!(queue.try_peek(|_| true), Some("y"));
        assert_eq!(queue.try_peek(|_| true), Some("y"));
        assert_eq!(queue.try_dequeue(), Some("y"));

        queue.enqueue("fast", 100, true);
        assert_eq!(queue.try_peek(|_| true), Some("fast"));
        assert_eq!(queue.try_dequeue(), Some("fast"));
    }

    #[test]
    fn rejected_peek_leaves_queue_untouched() {
        let queue = ConcurrentPriorityQueue::new();
        queue.enqueue_range(["a", "b"], 7, false);
        queue.enqueue("c", 9, false);

        assert_eq!(queue.try_peek(|p| *p < 5), None);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_peek(|p| *p == 7).map(|e| e == "a" || e == "b"), Some(true));
    }

    /// The condition is never consulted for instant elements.
    #[test]
    fn peek_condition_ignored_for_instant_lane() {
        let queue = ConcurrentPriorityQueue::new();
        queue.enqueue("late", 1, false);
        queue.enqueue("now", 1, true);

        let peeked = queue.try_peek(|_| panic!("condition evaluated for an instant element"));
        assert_eq!(peeked, Some("now"));
    }

    #[test]
    fn comparator_reverses_order() {
        let queue = ConcurrentPriorityQueue::with_comparator(ReverseOrder);
        queue.enqueue_range_with_priorities([("low", 1), ("high", 9), ("mid", 4)], false);
        assert_eq!(queue.drain(3), vec!["high", "mid", "low"]);

        let by_len = ConcurrentPriorityQueue::with_comparator(|a: &String, b: &String| {
            a.len().cmp(&b.len())
        });
        by_len.enqueue(1, "ccc".to_string(), false);
        by_len.enqueue(2, "a".to_string(), false);
        assert_eq!(by_len.try_peek(|p| p.len() == 1), Some(2));
    }

    /// A panicking comparator must not leave the gate closed for everybody else.
    #[test]
    fn gate_reopens_after_comparator_panic() {
        let fail_next = Arc::new(AtomicBool::new(false));
        let queue = ConcurrentPriorityQueue::with_comparator({
            let fail_next = Arc::clone(&fail_next);
            move |a: &u32, b: &u32| {
                assert!(!fail_next.swap(false, Ordering::SeqCst), "comparator failure");
                a.cmp(b)
            }
        });
        queue.enqueue("five", 5, false);

        fail_next.store(true, Ordering::SeqCst);
        let res = catch_unwind(AssertUnwindSafe(|| queue.enqueue("one", 1, false)));
        assert!(res.is_err());

        queue.enqueue("fast", 0, true);
        assert_eq!(queue.try_dequeue(), Some("fast"));
        assert_eq!(queue.len(), 1);

        queue.enqueue_range_with_priorities([("two", 2), ("three", 3)], false);
        fail_next.store(true, Ordering::SeqCst);
        let res = catch_unwind(AssertUnwindSafe(|| queue.try_dequeue()));
        assert!(res.is_err());

        assert_eq!(queue.drain(4), vec!["two", "three", "five"]);
    }

    /// Every batch lands in one piece: a reader only ever sees whole batches.
    #[test]
    fn batches_are_atomic_for_readers() {
        const BATCH: usize = 5;
        let queue = Arc::new(ConcurrentPriorityQueue::<usize, u32>::new());

        let writer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for round in 0..200 {
                    let batch = (0..BATCH).map(|i| round * BATCH + i);
                    if round % 2 == 0 {
                        queue.enqueue_range(batch, round as u32, true);
                    } else {
                        queue.enqueue_range(batch, round as u32, false);
                    }
                }
            })
        };

        while !writer.is_finished() {
            assert_eq!(queue.len() % BATCH, 0);
        }
        writer.join().unwrap();
        assert_eq!(queue.len(), 200 * BATCH);
    }
}
