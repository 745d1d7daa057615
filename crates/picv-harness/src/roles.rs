//! Role-thread behaviors: producer, consumer, annoyer.
//!
//! The three roles share one capability surface — a setup preamble (record
//! identity, pin, set tier, optionally register as a condvar helper), a run
//! loop, and a teardown (deregister) — with only the loop differing. The
//! shared preamble lives in [`drive`], which is what the orchestrator
//! actually spawns.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use picv_core::{
    busy_wait, current_tid, pin_to_cpu, set_fifo_priority, CircularBuffer, Closed, CvHandle,
    FtraceSink, HelperClient, SetupError, ThreadClock,
};

use crate::config::{PriorityTiers, RunConfig, SchedMode};
use crate::registry::ThreadRegistry;

/// Tagged payload travelling through the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item {
    pub producer: u32,
    pub seq: u64,
}

/// Everything the role threads share, built once per run and passed at
/// spawn time. Keeping this explicit (no process globals) lets several
/// harness runs coexist in one process.
pub struct RunContext {
    pub config: RunConfig,
    pub buffer: CircularBuffer<Item>,
    pub registry: ThreadRegistry,
    pub helpers: Box<dyn HelperClient>,
    pub trace: FtraceSink,
    pub clock: Box<dyn ThreadClock>,
    stop: AtomicBool,
}

impl RunContext {
    #[must_use]
    pub fn new(
        config: RunConfig,
        buffer: CircularBuffer<Item>,
        helpers: Box<dyn HelperClient>,
        trace: FtraceSink,
        clock: Box<dyn ThreadClock>,
    ) -> Self {
        let registry = ThreadRegistry::new(config.thread_count());
        Self {
            config,
            buffer,
            registry,
            helpers,
            trace,
            clock,
            stop: AtomicBool::new(false),
        }
    }

    /// Cooperative stop token, checked at the top of every role iteration.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Counters a role hands back when it exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoleStats {
    pub produced: u64,
    pub consumed: u64,
    pub bursts: u64,
    pub wait_total: Duration,
    pub wait_max: Duration,
}

impl RoleStats {
    pub fn absorb(&mut self, other: &RoleStats) {
        self.produced += other.produced;
        self.consumed += other.consumed;
        self.bursts += other.bursts;
        self.wait_total += other.wait_total;
        self.wait_max = self.wait_max.max(other.wait_max);
    }
}

/// Common role capability: everything [`drive`] needs beyond the loop body.
pub trait Role: Send + 'static {
    fn name(&self) -> String;

    /// Fixed SCHED_FIFO tier for this role.
    fn priority(&self, tiers: &PriorityTiers) -> i32;

    /// Condvar this role helps on when the priority-inheritance feature is
    /// enabled, or `None` for roles outside the protocol.
    fn helper_cv(&self, buffer: &CircularBuffer<Item>) -> Option<CvHandle>;

    fn run(&mut self, ctx: &RunContext) -> RoleStats;
}

/// Lowest role tier. Fills the buffer, burning `produce_cost` of CPU per
/// item; registers as helper on `not_empty` so waiting consumers can lend
/// it their priority.
pub struct Producer {
    pub index: u32,
}

impl Role for Producer {
    fn name(&self) -> String {
        format!("producer-{}", self.index)
    }

    fn priority(&self, tiers: &PriorityTiers) -> i32 {
        tiers.producer
    }

    fn helper_cv(&self, buffer: &CircularBuffer<Item>) -> Option<CvHandle> {
        Some(buffer.not_empty_handle())
    }

    fn run(&mut self, ctx: &RunContext) -> RoleStats {
        let mut stats = RoleStats::default();
        let mut seq = 0u64;
        while !ctx.stop_requested() {
            busy_wait(ctx.clock.as_ref(), ctx.config.produce_cost);
            let item = Item {
                producer: self.index,
                seq,
            };
            match ctx.buffer.put(item) {
                Ok(()) => {
                    seq += 1;
                    stats.produced += 1;
                }
                Err(Closed) => break,
            }
            thread::sleep(ctx.config.producer_pause);
        }
        debug!(produced = stats.produced, "{} done", self.name());
        stats
    }
}

/// Highest role tier. Drains the buffer, burning `consume_cost` per item,
/// and records how long each `take` blocked — the latency the inversion
/// scenarios are measured by. Helps on `not_full`.
pub struct Consumer {
    pub index: u32,
}

impl Role for Consumer {
    fn name(&self) -> String {
        format!("consumer-{}", self.index)
    }

    fn priority(&self, tiers: &PriorityTiers) -> i32 {
        tiers.consumer
    }

    fn helper_cv(&self, buffer: &CircularBuffer<Item>) -> Option<CvHandle> {
        Some(buffer.not_full_handle())
    }

    fn run(&mut self, ctx: &RunContext) -> RoleStats {
        let mut stats = RoleStats::default();
        while !ctx.stop_requested() {
            let started = Instant::now();
            match ctx.buffer.take() {
                Some(_item) => {
                    let waited = started.elapsed();
                    stats.wait_total += waited;
                    stats.wait_max = stats.wait_max.max(waited);
                    busy_wait(ctx.clock.as_ref(), ctx.config.consume_cost);
                    stats.consumed += 1;
                }
                None => break,
            }
        }
        debug!(consumed = stats.consumed, "{} done", self.name());
        stats
    }
}

/// Strictly between producer and consumer. Performs no buffer I/O: it
/// exists to preempt the producer for a bounded burst, then sleeps, forever.
/// Interference sources in the wild have no cooperative exit path, so the
/// stop token is only honored at burst boundaries and shutdown otherwise
/// relies on the registry kick.
pub struct Annoyer {
    pub index: u32,
}

impl Role for Annoyer {
    fn name(&self) -> String {
        format!("annoyer-{}", self.index)
    }

    fn priority(&self, tiers: &PriorityTiers) -> i32 {
        tiers.annoyer
    }

    fn helper_cv(&self, _buffer: &CircularBuffer<Item>) -> Option<CvHandle> {
        None
    }

    fn run(&mut self, ctx: &RunContext) -> RoleStats {
        let mut stats = RoleStats::default();
        while !ctx.stop_requested() {
            busy_wait(ctx.clock.as_ref(), ctx.config.annoyer_burst);
            stats.bursts += 1;
            if ctx.stop_requested() {
                break;
            }
            thread::sleep(ctx.config.annoyer_pause);
        }
        debug!(bursts = stats.bursts, "{} done", self.name());
        stats
    }
}

/// Run one role to completion: preamble, loop, teardown.
///
/// The identity is recorded before any call that can block, so the
/// orchestrator can always target this thread during forced shutdown.
pub fn drive(mut role: Box<dyn Role>, ctx: &RunContext, slot: usize) -> Result<RoleStats, SetupError> {
    let name = role.name();
    let tid = current_tid();
    ctx.registry.record(slot, tid);

    if ctx.config.sched == SchedMode::RealTime {
        pin_to_cpu(ctx.config.worker_cpu)?;
        set_fifo_priority(role.priority(&ctx.config.tiers))?;
    }

    info!(
        tid,
        prio = role.priority(&ctx.config.tiers),
        "starting {name}"
    );
    ctx.trace.emit(&format!(
        "starting {name}: tid {tid} prio {}",
        role.priority(&ctx.config.tiers)
    ));

    let helping = register_helper(role.as_ref(), ctx, tid, &name);

    let stats = role.run(ctx);

    if let Some(cv) = helping {
        if let Err(err) = ctx.helpers.del(cv, tid) {
            warn!(%err, "{name}: helper deregistration failed");
        }
        emit_helper_marker(ctx, &format!("{name}: stop helping on cv {:#x}", cv.as_usize()));
    }
    ctx.trace.emit(&format!("{name}: exiting"));
    Ok(stats)
}

/// Register the role on its helper condvar. Failures are advisory: the
/// buffer never depends on the helper set, so we log and keep going.
fn register_helper(
    role: &dyn Role,
    ctx: &RunContext,
    tid: picv_core::Tid,
    name: &str,
) -> Option<CvHandle> {
    let cv = role.helper_cv(&ctx.buffer)?;
    match ctx.helpers.add(cv, tid) {
        Ok(()) => {
            emit_helper_marker(ctx, &format!("{name}: helps on cv {:#x}", cv.as_usize()));
            Some(cv)
        }
        Err(err) => {
            warn!(%err, "{name}: helper registration failed, continuing without");
            emit_helper_marker(ctx, &format!("{name}: helper registration failed"));
            None
        }
    }
}

fn emit_helper_marker(ctx: &RunContext, line: &str) {
    if ctx.config.pi_helpers {
        ctx.trace.emit(line);
    }
}

/// Thread entry point: a fatal setup rejection aborts the whole process,
/// since the experiment is meaningless without its scheduling class.
pub(crate) fn drive_or_die(role: Box<dyn Role>, ctx: &RunContext, slot: usize) -> RoleStats {
    match drive(role, ctx, slot) {
        Ok(stats) => stats,
        Err(err) => {
            error!(%err, "fatal scheduler setup failure");
            eprintln!("picv-stress: {err}");
            process::exit(1);
        }
    }
}
