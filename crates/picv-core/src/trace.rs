//! Best-effort ftrace marker sink.
//!
//! Lines written to `trace_marker` interleave with the kernel's scheduler
//! events, which is how a run's inversion window is read back out of a
//! trace. The sink absorbs every failure: a harness without tracefs access
//! still runs the full experiment, it just loses the annotations.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;

/// Candidate tracefs mount points, newest layout first.
const TRACEFS_ROOTS: [&str; 3] = [
    "/sys/kernel/tracing",
    "/sys/kernel/debug/tracing",
    "/debug/tracing",
];

/// Shared, best-effort writer over `trace_marker` and `tracing_on`.
pub struct FtraceSink {
    marker: Mutex<Option<File>>,
    switch: Mutex<Option<File>>,
}

impl FtraceSink {
    /// Open the first available tracefs root. Missing or unwritable files
    /// leave the corresponding channel disabled rather than failing.
    #[must_use]
    pub fn open() -> Self {
        for root in TRACEFS_ROOTS {
            let sink = Self::open_at(Path::new(root));
            if sink.is_open() {
                return sink;
            }
        }
        tracing::debug!("no writable tracefs root found, trace markers disabled");
        Self::disabled()
    }

    /// Open against a specific tracefs root.
    #[must_use]
    pub fn open_at(root: &Path) -> Self {
        let open = |name: &str| OpenOptions::new().write(true).open(root.join(name)).ok();
        Self {
            marker: Mutex::new(open("trace_marker")),
            switch: Mutex::new(open("tracing_on")),
        }
    }

    /// A sink that drops everything, for runs with tracing off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            marker: Mutex::new(None),
            switch: Mutex::new(None),
        }
    }

    /// True if at least the marker channel is writable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.marker.lock().is_some()
    }

    /// Write one marker line. Silently absorbs an unopened or failed sink.
    pub fn emit(&self, line: &str) {
        let mut guard = self.marker.lock();
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{line}");
        }
    }

    /// Toggle the global `tracing_on` switch around a run.
    pub fn set_tracing(&self, on: bool) {
        let mut guard = self.switch.lock();
        if let Some(file) = guard.as_mut() {
            let _ = file.write_all(if on { b"1" } else { b"0" });
        }
    }
}
