//! Per-thread CPU-time busy-wait.
//!
//! Role threads model bounded work by burning a fixed amount of *their own
//! scheduled CPU time*, not wall-clock time: a preempted thread stops
//! accumulating, so the amount of work is reproducible no matter how often
//! the scheduler interrupts it. That property is exactly what makes the
//! inversion scenarios deterministic, so the spin loop never yields and
//! never blocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Source of the calling thread's consumed CPU time.
///
/// A trait so role-loop logic can run against a deterministic fake in unit
/// tests instead of burning multiple seconds of real CPU time.
pub trait ThreadClock: Send + Sync {
    /// CPU time consumed by the calling thread so far.
    fn now(&self) -> Duration;
}

/// Real clock over `CLOCK_THREAD_CPUTIME_ID`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuTimeClock;

impl ThreadClock for CpuTimeClock {
    fn now(&self) -> Duration {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid out-pointer; CLOCK_THREAD_CPUTIME_ID is
        // always readable for the calling thread.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
        debug_assert_eq!(rc, 0);
        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    }
}

/// Deterministic clock for tests: advances by a fixed step on every sample.
///
/// The self-advancing step guarantees any `busy_wait` against it terminates
/// after a predictable number of samples.
#[derive(Debug)]
pub struct FakeClock {
    now_ns: AtomicU64,
    step_ns: u64,
}

impl FakeClock {
    #[must_use]
    pub fn new(step: Duration) -> Self {
        Self {
            now_ns: AtomicU64::new(0),
            step_ns: step.as_nanos() as u64,
        }
    }

    /// Jump the clock forward without a sample.
    pub fn advance(&self, by: Duration) {
        self.now_ns.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Number of nanoseconds sampled so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::Relaxed))
    }
}

impl ThreadClock for FakeClock {
    fn now(&self) -> Duration {
        let prev = self.now_ns.fetch_add(self.step_ns, Ordering::Relaxed);
        Duration::from_nanos(prev)
    }
}

/// Spin until the calling thread has consumed `amount` more CPU time.
///
/// The deadline is computed from a single sample taken on entry; the loop
/// then polls the clock without yielding until the deadline is reached.
/// Never returns early.
pub fn busy_wait(clock: &dyn ThreadClock, amount: Duration) {
    let deadline = clock.now() + amount;
    while clock.now() < deadline {
        std::hint::spin_loop();
    }
}
