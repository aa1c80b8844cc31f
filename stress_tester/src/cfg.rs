use fastlane::SpinPolicy;

#[derive(Debug, Clone, clap::Parser)]
pub struct Cfg {
    /// How threads wait for the admission gate of the queue.
    #[arg(value_enum, default_value_t = Spin::Backoff)]
    pub spin: Spin,
    /// Number of Producers that will enqueue jobs.
    #[arg(short, long)]
    pub producer_num: usize,
    /// Number of jobs each producer will enqueue during the test.
    #[arg(short, long)]
    pub job_num: usize,
    /// Number of Consumers that will dequeue jobs.
    #[arg(short, long, default_value_t = 1)]
    pub consumer_num: usize,
    /// Largest batch handed to the queue in a single range operation.
    #[arg(short = 'b', long, default_value_t = 16)]
    pub max_batch_size: usize,
    /// Share of submissions that go to the instant lane, between 0 and 1.
    #[arg(short, long, default_value_t = 0.1)]
    pub instant_ratio: f64,
    /// Highest priority value handed out (priorities start at 0).
    #[arg(long, default_value_t = 1_000)]
    pub max_priority: u32,
    /// Preallocated capacity of the queue. Defaults to the total number of jobs.
    #[arg(long, allow_negative_numbers = true)]
    pub capacity: Option<i64>,
    // Hard cap on the test's execution time
    #[arg(long, default_value_t = 10)]
    pub run_duration_seconds: u64,
}

#[derive(Debug, Clone, Copy, strum::EnumString, clap::ValueEnum)]
pub enum Spin {
    #[strum(ascii_case_insensitive)]
    Busy,
    #[strum(ascii_case_insensitive)]
    Backoff,
}

impl From<Spin> for SpinPolicy {
    fn from(spin: Spin) -> Self {
        match spin {
            Spin::Busy => SpinPolicy::Busy,
            Spin::Backoff => SpinPolicy::Backoff,
        }
    }
}
