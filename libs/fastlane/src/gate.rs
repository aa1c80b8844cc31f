//! Single-admission gate that serializes the enqueue-side critical sections of a queue.
//!
//! Writers race for admission with a compare-and-swap on one atomic flag and retry without ever
//! parking the thread. Readers only wait until the flag is clear, so they never start observing
//! the queue while a writer is half way through a batch.
//!
//! The gate provides no fairness: under sustained contention a thread can lose the race forever.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::utils::Backoff;
use tracing::trace;

/// How a thread waits between two failed attempts to pass the gate.
///
/// Neither policy parks the thread; they only differ in how much CPU is burnt while waiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::EnumString, strum::Display)]
pub enum SpinPolicy {
    /// Retry immediately, only hinting the CPU that this is a spin loop.
    #[strum(ascii_case_insensitive, serialize = "busy")]
    Busy,
    /// Exponential spinning that escalates to yielding the time slice to the scheduler.
    #[default]
    #[strum(ascii_case_insensitive, serialize = "backoff")]
    Backoff,
}

/// Number of failed attempts after which a successful admission is logged as contended.
const CONTENDED_RETRIES: u64 = 1 << 10;

#[derive(Debug)]
pub struct EnqueueGate {
    occupied: AtomicBool,
    policy: SpinPolicy,
}

impl Default for EnqueueGate {
    fn default() -> Self {
        Self::new(SpinPolicy::default())
    }
}

impl EnqueueGate {
    pub const fn new(policy: SpinPolicy) -> Self {
        Self {
            occupied: AtomicBool::new(false),
            policy,
        }
    }

    pub fn policy(&self) -> SpinPolicy {
        self.policy
    }

    /// Waits for admission, runs `body` and reopens the gate, also when `body` panics.
    ///
    /// # Note
    /// Calling this again from within `body` on the same gate never returns.
    pub fn admit_and_run<R>(&self, body: impl FnOnce() -> R) -> R {
        let _admission = self.admit();
        body()
    }

    fn admit(&self) -> Admission<'_> {
        let mut spinner = Spinner::new(self.policy);
        loop {
            // test-and-test-and-set
            if !self.occupied.load(Ordering::Relaxed)
                && self
                    .occupied
                    .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                break;
            }
            spinner.spin();
        }

        if spinner.retries >= CONTENDED_RETRIES {
            trace!(retries = spinner.retries, "admission gate contended");
        }
        Admission { gate: self }
    }

    /// Spins until no writer holds admission.
    ///
    /// Everything a writer committed before leaving the gate is visible to the caller afterwards.
    pub fn wait_unoccupied(&self) {
        let mut spinner = Spinner::new(self.policy);
        while self.occupied.load(Ordering::Acquire) {
            spinner.spin();
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::Acquire)
    }
}

/// Held by the admitted writer; reopens the gate when dropped, including during unwinding.
struct Admission<'a> {
    gate: &'a EnqueueGate,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.gate.occupied.store(false, Ordering::Release);
    }
}

struct Spinner {
    policy: SpinPolicy,
    backoff: Backoff,
    retries: u64,
}

impl Spinner {
    fn new(policy: SpinPolicy) -> Self {
        Self {
            policy,
            backoff: Backoff::new(),
            retries: 0,
        }
    }

    fn spin(&mut self) {
        self.retries += 1;
        match self.policy {
            SpinPolicy::Busy => std::hint::spin_loop(),
            SpinPolicy::Backoff => self.backoff.snooze(),
        }
    }
}
