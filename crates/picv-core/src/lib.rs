//! Synchronization core for the picv priority-inversion stress harness.
//!
//! Provides the bounded circular buffer under test, the per-thread CPU-time
//! busy-wait primitive, the condvar helper-registration client, and the thin
//! scheduling/tracing glue over the kernel interfaces. The role threads and
//! the orchestrator that drive these live in `picv-harness`.

pub mod buffer;
pub mod clock;
pub mod helpers;
pub mod sched;
pub mod trace;

pub use buffer::{CapacityError, CircularBuffer, Closed, CvHandle};
pub use clock::{busy_wait, CpuTimeClock, FakeClock, ThreadClock};
pub use helpers::{FutexHelperClient, HelperClient, HelperError, NullHelperClient, Tid};
pub use sched::{current_tid, install_kick_handler, kick, pin_to_cpu, set_fifo_priority, SetupError};
pub use trace::FtraceSink;
