use std::sync::Arc;

use anyhow::{Context, bail};
use cfg::Cfg;
use clap::Parser;
use fastlane::{
    ConcurrentPriorityQueue, NaturalOrder,
    stress::{Job, StressTestConfig, run_stress_test},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod cfg;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = cfg::Cfg::parse();
    info!("Running configuration:\n{cfg:#?}");

    if let Err(e) = run(cfg) {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

fn run(cfg: Cfg) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&cfg.instant_ratio) {
        bail!("instant ratio must be between 0 and 1, got {}", cfg.instant_ratio);
    }
    if cfg.consumer_num == 0 {
        bail!("at least one consumer is needed to drain the queue");
    }

    let capacity = match cfg.capacity {
        Some(capacity) => capacity,
        None => cfg
            .job_num
            .checked_mul(cfg.producer_num)
            .and_then(|total| i64::try_from(total).ok())
            .ok_or_else(|| anyhow::anyhow!("Overflow while calculating queue capacity"))?,
    };

    let queue_cfg = fastlane::Cfg {
        capacity: Some(capacity),
        spin: cfg.spin.into(),
    };
    let queue: ConcurrentPriorityQueue<Job, u32> =
        ConcurrentPriorityQueue::from_cfg(queue_cfg, NaturalOrder)
            .context("could not create priority queue")?;

    let config = StressTestConfig {
        num_producers: cfg.producer_num,
        jobs_per_producer: cfg.job_num,
        num_consumers: cfg.consumer_num,
        max_batch_size: cfg.max_batch_size,
        instant_ratio: cfg.instant_ratio,
        priority_range: (0, cfg.max_priority),
        run_duration_seconds: cfg.run_duration_seconds,
    };
    let results = run_stress_test(Arc::new(queue), config);
    results.print_summary();

    if !results.is_consistent() {
        bail!(
            "queue integrity violated: {} duplicates, {} missing",
            results.duplicates,
            results.missing
        );
    }
    Ok(())
}
