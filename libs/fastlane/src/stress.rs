use hdrhistogram::Histogram;
use rand::{Rng, rngs::ThreadRng};
use std::collections::HashSet;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::PriorityQueue;

/// Unit of work pushed through the queue during a stress test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    /// Unique over the whole test run: producer id in the upper, sequence number in the lower half.
    pub id: u64,
    pub priority: u32,
    pub instant: bool,
    pub submitted_at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct StressTestConfig {
    pub num_producers: usize,
    pub jobs_per_producer: usize,
    pub num_consumers: usize,
    /// Upper bound for the size of batches submitted through the range operations.
    pub max_batch_size: usize,
    /// Share of submissions, between `0.0` and `1.0`, that go to the instant lane.
    pub instant_ratio: f64,
    /// Inclusive range of generated priorities.
    pub priority_range: (u32, u32),
    pub run_duration_seconds: u64,
}

/// How a producer hands its next jobs to the queue.
#[derive(Debug, Clone, Copy)]
enum Submission {
    Single,
    SharedPriority(usize),
    OwnPriorities(usize),
}

impl StressTestConfig {
    fn randomized_submission(&self, rng: &mut ThreadRng, remaining: usize) -> Submission {
        let max_batch = self.max_batch_size.clamp(1, remaining.max(1));
        match rng.random_range(0..3) {
            0 => Submission::Single,
            1 => Submission::SharedPriority(rng.random_range(1..=max_batch)),
            _ => Submission::OwnPriorities(rng.random_range(1..=max_batch)),
        }
    }

    fn randomized_priority(&self, rng: &mut ThreadRng) -> u32 {
        let (low, high) = self.priority_range;
        rng.random_range(low.min(high)..=high.max(low))
    }

    fn randomized_instant(&self, rng: &mut ThreadRng) -> bool {
        rng.random_bool(self.instant_ratio.clamp(0.0, 1.0))
    }
}

struct Producer {
    id: u64,
    sequence: u64,
}

impl Producer {
    fn next_job(&mut self, priority: u32, instant: bool) -> Job {
        self.sequence += 1;
        Job {
            id: (self.id << 32) | self.sequence,
            priority,
            instant,
            submitted_at: Instant::now(),
        }
    }
}

/// Runs producers and consumers against `queue` until every producer has submitted its jobs (or
/// the configured duration is over) and the queue has been emptied.
pub fn run_stress_test<Q>(queue: Arc<Q>, config: StressTestConfig) -> StressReport
where
    Q: PriorityQueue<Job, u32> + 'static,
{
    info!(
        producers = config.num_producers,
        consumers = config.num_consumers,
        jobs_per_producer = config.jobs_per_producer,
        "starting stress test"
    );
    let start_time = Instant::now();
    let test_end_time = start_time + Duration::from_secs(config.run_duration_seconds);

    // region:    --- Producers
    let submitted_count = Arc::new(AtomicUsize::new(0));
    let producers_stopped = Arc::new(AtomicUsize::new(0));
    let mut producer_handles = vec![];

    for producer_id in 1..=config.num_producers {
        let cloned_queue = Arc::clone(&queue);
        let cloned_submitted_count = Arc::clone(&submitted_count);
        let cloned_producers_stopped = Arc::clone(&producers_stopped);

        let handle = thread::spawn(move || {
            let mut rng = rand::rng();
            let mut producer = Producer {
                id: producer_id as u64,
                sequence: 0,
            };
            let mut local_submitted = 0;

            while Instant::now() < test_end_time && local_submitted < config.jobs_per_producer {
                let remaining = config.jobs_per_producer - local_submitted;
                let instant = config.randomized_instant(&mut rng);

                let submitted = match config.randomized_submission(&mut rng, remaining) {
                    Submission::Single => {
                        let job = producer.next_job(config.randomized_priority(&mut rng), instant);
                        cloned_queue.enqueue(job, job.priority, instant);
                        1
                    }
                    Submission::SharedPriority(n) => {
                        let priority = config.randomized_priority(&mut rng);
                        let jobs: Vec<Job> =
                            (0..n).map(|_| producer.next_job(priority, instant)).collect();
                        cloned_queue.enqueue_range(jobs, priority, instant);
                        n
                    }
                    Submission::OwnPriorities(n) => {
                        let items: Vec<(Job, u32)> = (0..n)
                            .map(|_| {
                                let job = producer
                                    .next_job(config.randomized_priority(&mut rng), instant);
                                (job, job.priority)
                            })
                            .collect();
                        cloned_queue.enqueue_range_with_priorities(items, instant);
                        n
                    }
                };

                local_submitted += submitted;
                cloned_submitted_count.fetch_add(submitted, Ordering::Relaxed);
            }

            cloned_producers_stopped.fetch_add(1, Ordering::Release);
            debug!(producer_id, local_submitted, "producer completed");
        });

        producer_handles.push(handle);
    }
    // endregion: --- Producers

    // region:    --- Consumers
    let mut consumer_handles = vec![];

    for consumer_id in 1..=config.num_consumers {
        let cloned_queue = Arc::clone(&queue);
        let cloned_producers_stopped = Arc::clone(&producers_stopped);

        let handle = thread::spawn(move || {
            let mut drained = ConsumerStats::new();

            loop {
                // Read the flag before dequeuing: nothing can be enqueued once all producers are
                // done, so an empty queue after that point stays empty.
                let producers_done =
                    cloned_producers_stopped.load(Ordering::Acquire) == config.num_producers;
                match cloned_queue.try_dequeue() {
                    Some(job) => drained.record(&job),
                    None if producers_done => break,
                    None => thread::yield_now(),
                }
            }

            debug!(consumer_id, drained = drained.ids.len(), "consumer completed");
            drained
        });
        consumer_handles.push(handle);
    }
    // endregion: --- Consumers

    for handle in producer_handles {
        handle.join().expect("Producer thread panicked");
    }
    info!("producers finished, waiting for consumers");

    let mut totals = ConsumerStats::new();
    for handle in consumer_handles {
        let stats = handle.join().expect("Consumer thread panicked");
        totals.merge(stats);
    }

    let test_duration = start_time.elapsed();
    let total_submitted = submitted_count.load(Ordering::Relaxed);
    let (duplicates, unique) = count_duplicates(&totals.ids);
    let missing = total_submitted.saturating_sub(unique);
    if duplicates > 0 || missing > 0 {
        warn!(duplicates, missing, "queue lost or duplicated jobs");
    }

    StressReport {
        test_duration,
        total_submitted,
        total_dequeued: totals.ids.len(),
        duplicates,
        missing,
        jobs_per_second: totals.ids.len() as f64 / test_duration.as_secs_f64().max(1e-9),
        instant_latency: totals.instant_latency,
        prioritized_latency: totals.prioritized_latency,
    }
}

fn count_duplicates(ids: &[u64]) -> (usize, usize) {
    let mut seen = HashSet::with_capacity(ids.len());
    let duplicates = ids.iter().filter(|id| !seen.insert(**id)).count();
    (duplicates, seen.len())
}

fn latency_histogram() -> Histogram<u64> {
    Histogram::new_with_max(60_000_000, 3).expect("Initializing the histogram should work")
}

struct ConsumerStats {
    ids: Vec<u64>,
    instant_latency: Histogram<u64>,
    prioritized_latency: Histogram<u64>,
}

impl ConsumerStats {
    fn new() -> Self {
        Self {
            ids: vec![],
            instant_latency: latency_histogram(),
            prioritized_latency: latency_histogram(),
        }
    }

    fn record(&mut self, job: &Job) {
        self.ids.push(job.id);
        let hist = if job.instant {
            &mut self.instant_latency
        } else {
            &mut self.prioritized_latency
        };
        hist.saturating_record(job.submitted_at.elapsed().as_micros() as u64);
    }

    fn merge(&mut self, other: Self) {
        self.ids.extend(other.ids);
        // Both sides share the same bounds, adding cannot fail.
        self.instant_latency.add(&other.instant_latency).ok();
        self.prioritized_latency.add(&other.prioritized_latency).ok();
    }
}

#[derive(Debug)]
pub struct StressReport {
    pub test_duration: Duration,
    pub total_submitted: usize,
    pub total_dequeued: usize,
    /// Dequeues that returned a job a second time.
    pub duplicates: usize,
    /// Submitted jobs that were never dequeued.
    pub missing: usize,
    pub jobs_per_second: f64,
    pub instant_latency: Histogram<u64>,
    pub prioritized_latency: Histogram<u64>,
}

impl StressReport {
    /// True if every submitted job was dequeued exactly once.
    pub fn is_consistent(&self) -> bool {
        self.duplicates == 0 && self.missing == 0 && self.total_submitted == self.total_dequeued
    }

    pub fn print_summary(&self) {
        use num_format::{Locale, SystemLocale, ToFormattedString};
        let fmt = |n: u64| match SystemLocale::default() {
            Ok(locale) => n.to_formatted_string(&locale),
            Err(_) => n.to_formatted_string(&Locale::en),
        };

        println!("\n{:=^75}", " Stress Test Results ");
        println!("Test duration: {:?}", self.test_duration);
        println!("Jobs submitted: {}", fmt(self.total_submitted as u64));
        println!("Jobs dequeued:  {}", fmt(self.total_dequeued as u64));
        println!("Jobs per second: {:.2}", self.jobs_per_second);
        println!(
            "Integrity: {} duplicates, {} missing",
            self.duplicates, self.missing
        );

        for (lane, hist) in [
            ("instant", &self.instant_latency),
            ("prioritized", &self.prioritized_latency),
        ] {
            if hist.is_empty() {
                println!("Latency {lane:>11}: no jobs");
                continue;
            }
            println!(
                "Latency {lane:>11}: {} jobs, avg {:.1} µs, p50 {} µs, p99 {} µs, max {} µs",
                fmt(hist.len()),
                hist.mean(),
                fmt(hist.value_at_quantile(0.5)),
                fmt(hist.value_at_quantile(0.99)),
                fmt(hist.max()),
            );
        }
    }
}
