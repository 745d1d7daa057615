//! Multi-role concurrency harness for provoking and observing priority
//! inversion around the `picv-core` bounded buffer.
//!
//! The harness spawns fixed-priority producer, consumer, and annoyer
//! threads, runs them for a configured duration, then tears the system down
//! deterministically. Everything the roles share travels in an explicit
//! [`RunContext`] — no process globals — so several harness runs can coexist
//! in one process.

pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod roles;
pub mod summary;

pub use config::{ConfigError, PriorityTiers, RunConfig, SchedMode};
pub use orchestrator::{Harness, HarnessError, Phase};
pub use registry::ThreadRegistry;
pub use roles::{drive, Annoyer, Consumer, Item, Producer, Role, RoleStats, RunContext};
pub use summary::RunSummary;
