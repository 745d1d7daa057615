//! Harness orchestrator: spawn, run, force-stop, join.
//!
//! The run moves through `Configured -> Running -> ShuttingDown -> Joined`.
//! Spawn order is consumers, then producers, then (after the configured
//! delay) annoyers — the order only matters for trace readability. Teardown
//! is the inverse of the annoyer's unbounded-interference design: a stop
//! token for the cooperative roles, a buffer close to flush blocked
//! waiters, and an unconditional kick of every registered identity for
//! whatever is left.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use picv_core::{
    install_kick_handler, kick, pin_to_cpu, set_fifo_priority, CircularBuffer, CpuTimeClock,
    FtraceSink, FutexHelperClient, HelperClient, NullHelperClient, SetupError,
};

use crate::config::{ConfigError, RunConfig, SchedMode};
use crate::roles::{drive_or_die, Annoyer, Consumer, Producer, Role, RoleStats, RunContext};
use crate::summary::RunSummary;

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configured,
    Running,
    ShuttingDown,
    Joined,
}

/// A run failure in the orchestrator itself. Setup failures inside role
/// threads do not surface here — they abort the process directly.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("failed to spawn {role}: {source}")]
    Spawn { role: String, source: io::Error },
}

/// One configured harness run.
pub struct Harness {
    ctx: Arc<RunContext>,
    phase: Phase,
}

impl Harness {
    /// Validate the configuration and build the shared run context.
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer =
            CircularBuffer::with_capacity(config.capacity).map_err(|e| ConfigError::ZeroCapacity(e.0))?;
        let helpers: Box<dyn HelperClient> = if config.pi_helpers {
            Box::new(FutexHelperClient)
        } else {
            Box::new(NullHelperClient)
        };
        let trace = if config.ftrace {
            FtraceSink::open()
        } else {
            FtraceSink::disabled()
        };
        let ctx = RunContext::new(config, buffer, helpers, trace, Box::new(CpuTimeClock));
        Ok(Self {
            ctx: Arc::new(ctx),
            phase: Phase::Configured,
        })
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run to completion and tear down. Consumes the harness; `Joined` is
    /// terminal.
    pub fn run(mut self) -> Result<RunSummary, HarnessError> {
        let cfg = self.ctx.config.clone();
        let started = Instant::now();

        install_kick_handler();
        if cfg.sched == SchedMode::RealTime {
            pin_to_cpu(cfg.control_cpu)?;
            set_fifo_priority(cfg.tiers.control)?;
        }
        self.ctx.trace.set_tracing(true);

        self.phase = Phase::Running;
        info!(
            producers = cfg.producers,
            consumers = cfg.consumers,
            annoyers = cfg.annoyers,
            helpers = cfg.pi_helpers,
            "running for {:?}",
            cfg.duration
        );

        let mut handles = Vec::with_capacity(cfg.thread_count());
        let mut slot = 0usize;
        for i in 0..cfg.consumers {
            handles.push(self.spawn(Box::new(Consumer { index: i as u32 }), &mut slot)?);
        }
        for i in 0..cfg.producers {
            handles.push(self.spawn(Box::new(Producer { index: i as u32 }), &mut slot)?);
        }

        if cfg.annoyers > 0 {
            thread::sleep(cfg.annoyer_delay);
            for i in 0..cfg.annoyers {
                handles.push(self.spawn(Box::new(Annoyer { index: i as u32 }), &mut slot)?);
            }
            thread::sleep(cfg.duration.saturating_sub(cfg.annoyer_delay));
        } else {
            thread::sleep(cfg.duration);
        }

        self.phase = Phase::ShuttingDown;
        info!("shutting down");
        self.ctx.trace.emit("harness: shutting down");
        self.ctx.request_stop();
        self.ctx.buffer.close();
        for tid in self.ctx.registry.snapshot() {
            // Unconditional: covers annoyers mid-burst and anything blocked
            // in a syscall. A thread that already exited is fine to miss.
            if let Err(err) = kick(tid) {
                if err.raw_os_error() != Some(libc::ESRCH) {
                    warn!(tid, %err, "kick failed");
                }
            }
        }

        let mut stats = RoleStats::default();
        let mut joined = 0usize;
        for (name, handle) in handles {
            match handle.join() {
                Ok(role_stats) => {
                    stats.absorb(&role_stats);
                    joined += 1;
                }
                // A panicking role is a harness bug; re-raise it.
                Err(payload) => {
                    warn!("{name} panicked");
                    std::panic::resume_unwind(payload);
                }
            }
        }
        self.phase = Phase::Joined;
        self.ctx.trace.set_tracing(false);

        let summary = RunSummary::new(
            cfg.producers,
            cfg.consumers,
            cfg.annoyers,
            cfg.pi_helpers,
            joined,
            &stats,
            self.ctx.buffer.occupancy(),
            started.elapsed(),
        );
        info!(%summary, "run complete");
        Ok(summary)
    }

    fn spawn(
        &self,
        role: Box<dyn Role>,
        slot: &mut usize,
    ) -> Result<(String, JoinHandle<RoleStats>), HarnessError> {
        let name = role.name();
        let ctx = Arc::clone(&self.ctx);
        let this_slot = *slot;
        *slot += 1;
        self.ctx.trace.emit(&format!("harness: creating {name}"));
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || drive_or_die(role, &ctx, this_slot))
            .map_err(|source| HarnessError::Spawn {
                role: name.clone(),
                source,
            })?;
        Ok((name, handle))
    }
}
