
mod test_suite {
    use super::suite;
    use crate::{Cfg, ConcurrentPriorityQueue, NaturalOrder, SpinPolicy};

    type Queue = ConcurrentPriorityQueue<String, u32>;

    /// Pure busy spinning on the admission gate, with a preallocated heap.
    struct BusySpinTester;

    impl suite::Tester<Queue> for BusySpinTester {
        fn create_queue(&self) -> Queue {
            let cfg = Cfg {
                capacity: Some(5_000),
                spin: SpinPolicy::Busy,
            };
            ConcurrentPriorityQueue::from_cfg(cfg, NaturalOrder).unwrap()
        }
    }

    /// Default construction: backoff spinning, no capacity hint.
    struct BackoffTester;

    impl suite::Tester<Queue> for BackoffTester {
        fn create_queue(&self) -> Queue {
            ConcurrentPriorityQueue::new()
        }
    }

    macro_rules! suite_for {
        ($name:ident, $tester:expr) => {
            mod $name {
                use super::*;

                #[test]
                fn ordering_by_priority() {
                    suite::test_ordering_by_priority($tester);
                }

                #[test]
                fn instant_precedence() {
                    suite::test_instant_precedence($tester);
                }

                #[test]
                fn peek() {
                    suite::test_peek($tester);
                }

                #[test]
                fn concurrent_enqueue() {
                    suite::test_concurrent_enqueue($tester);
                }

                #[test]
                fn concurrent_enqueue_and_dequeue() {
                    suite::test_concurrent_enqueue_and_dequeue($tester);
                }
            }
        };
    }

    suite_for!(busy_spin, BusySpinTester);
    suite_for!(backoff, BackoffTester);
}
