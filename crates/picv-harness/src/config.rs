//! Run configuration: role counts, feature flags, scheduling layout, and
//! workload costs. Validated once at harness construction, immutable after.

use std::time::Duration;

use thiserror::Error;

/// Reference buffer capacity.
pub const DEFAULT_CAPACITY: usize = 8;

/// Rejected configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("run duration must be greater than zero")]
    ZeroDuration,
    #[error("buffer capacity must be at least 1 (got {0})")]
    ZeroCapacity(usize),
    #[error(
        "priority tiers must satisfy producer < annoyer < consumer < control \
         (got {producer} / {annoyer} / {consumer} / {control})"
    )]
    TierOrdering {
        producer: i32,
        annoyer: i32,
        consumer: i32,
        control: i32,
    },
    #[error("annoyer start delay {delay:?} exceeds run duration {duration:?}")]
    DelayPastDuration { delay: Duration, duration: Duration },
}

/// Whether role threads request their real-time scheduling class.
///
/// `BestEffort` skips the affinity/priority syscalls entirely so the full
/// orchestration path runs without privileges; the inversion experiment
/// itself only means anything under `RealTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedMode {
    RealTime,
    BestEffort,
}

/// Fixed SCHED_FIFO tiers for each role plus the control thread.
///
/// The defaults reproduce the reference scenario: the producer is the lowest
/// of the three so the annoyer can preempt it, and the control thread
/// outranks everyone so teardown always gets the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityTiers {
    pub producer: i32,
    pub annoyer: i32,
    pub consumer: i32,
    pub control: i32,
}

impl Default for PriorityTiers {
    fn default() -> Self {
        Self {
            producer: 93,
            annoyer: 94,
            consumer: 95,
            control: 96,
        }
    }
}

impl PriorityTiers {
    fn ordered(&self) -> bool {
        self.producer < self.annoyer
            && self.annoyer < self.consumer
            && self.consumer < self.control
    }
}

/// Immutable description of one harness run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub producers: usize,
    pub consumers: usize,
    pub annoyers: usize,
    /// Register roles as condvar helpers (the priority-inheritance feature).
    pub pi_helpers: bool,
    /// Bracket the run with ftrace marker annotations.
    pub ftrace: bool,
    pub duration: Duration,
    pub capacity: usize,
    pub sched: SchedMode,
    pub tiers: PriorityTiers,
    /// CPU all role threads contend on.
    pub worker_cpu: usize,
    /// CPU the orchestrator retreats to.
    pub control_cpu: usize,
    /// Annoyers are spawned this long after the other roles, so inversion
    /// forms in an already-running system.
    pub annoyer_delay: Duration,
    /// CPU time burned per produced item.
    pub produce_cost: Duration,
    /// CPU time burned per consumed item.
    pub consume_cost: Duration,
    /// Producer pause between items.
    pub producer_pause: Duration,
    /// CPU time burned per annoyer burst.
    pub annoyer_burst: Duration,
    /// Annoyer pause between bursts.
    pub annoyer_pause: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            producers: 1,
            consumers: 1,
            annoyers: 1,
            pi_helpers: false,
            ftrace: false,
            duration: Duration::from_secs(10),
            capacity: DEFAULT_CAPACITY,
            sched: SchedMode::RealTime,
            tiers: PriorityTiers::default(),
            worker_cpu: 0,
            control_cpu: 1,
            annoyer_delay: Duration::from_secs(0),
            produce_cost: Duration::from_millis(2),
            consume_cost: Duration::from_millis(1),
            producer_pause: Duration::from_millis(1),
            annoyer_burst: Duration::from_millis(100),
            annoyer_pause: Duration::from_millis(10),
        }
    }
}

impl RunConfig {
    /// Total role threads this configuration spawns.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.producers + self.consumers + self.annoyers
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity(self.capacity));
        }
        if !self.tiers.ordered() {
            return Err(ConfigError::TierOrdering {
                producer: self.tiers.producer,
                annoyer: self.tiers.annoyer,
                consumer: self.tiers.consumer,
                control: self.tiers.control,
            });
        }
        if self.annoyers > 0 && self.annoyer_delay >= self.duration {
            return Err(ConfigError::DelayPastDuration {
                delay: self.annoyer_delay,
                duration: self.duration,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_duration_rejected() {
        let cfg = RunConfig {
            duration: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDuration));
    }

    #[test]
    fn zero_capacity_rejected() {
        let cfg = RunConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroCapacity(0)));
    }

    #[test]
    fn inverted_tiers_rejected() {
        let cfg = RunConfig {
            tiers: PriorityTiers {
                producer: 95,
                annoyer: 94,
                consumer: 93,
                control: 96,
            },
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TierOrdering { .. })
        ));
    }

    #[test]
    fn annoyer_delay_must_fit_in_duration() {
        let cfg = RunConfig {
            duration: Duration::from_secs(1),
            annoyer_delay: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DelayPastDuration { .. })
        ));
        // Irrelevant when no annoyers are configured.
        let cfg = RunConfig {
            annoyers: 0,
            ..cfg
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_role_counts_are_allowed() {
        let cfg = RunConfig {
            producers: 0,
            consumers: 0,
            annoyers: 0,
            ..Default::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.thread_count(), 0);
    }
}
