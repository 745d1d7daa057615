//! Scheduling glue: affinity, real-time priority, thread identity, and the
//! last-resort kick used during forced shutdown.
//!
//! Affinity and priority rejections are fatal — the experiment is
//! meaningless without the requested scheduling class, so callers abort the
//! process rather than continue degraded.

use std::io;
use std::mem;
use std::sync::Once;

use thiserror::Error;

use crate::helpers::Tid;

/// Signal used to interrupt a blocked thread during forced shutdown. The
/// installed handler does nothing; delivery exists only to make blocking
/// syscalls return `EINTR` so the thread re-checks its stop token.
const KICK_SIGNAL: libc::c_int = libc::SIGUSR1;

/// Fatal scheduler-setup rejection.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("sched_setaffinity to cpu {cpu} rejected: {source}")]
    Affinity { cpu: usize, source: io::Error },
    #[error("SCHED_FIFO priority {priority} rejected: {source}")]
    Priority { priority: i32, source: io::Error },
}

/// Pin the calling thread to a single CPU.
pub fn pin_to_cpu(cpu: usize) -> Result<(), SetupError> {
    // SAFETY: cpu_set_t is a plain bitmask; CPU_ZERO/CPU_SET only write
    // within the set we own.
    unsafe {
        let mut set: libc::cpu_set_t = mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        if libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(SetupError::Affinity {
                cpu,
                source: io::Error::last_os_error(),
            });
        }
    }
    Ok(())
}

/// Put the calling thread into SCHED_FIFO at a fixed priority.
pub fn set_fifo_priority(priority: i32) -> Result<(), SetupError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: param is a valid sched_param; pid 0 targets the calling thread.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(SetupError::Priority {
            priority,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Kernel identity of the calling thread.
#[must_use]
pub fn current_tid() -> Tid {
    // SAFETY: gettid has no failure modes.
    unsafe { libc::syscall(libc::SYS_gettid) as Tid }
}

extern "C" fn kick_noop(_sig: libc::c_int) {}

/// Install the no-op handler for the kick signal. Idempotent; must run
/// before the first [`kick`] so delivery interrupts instead of killing.
pub fn install_kick_handler() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // SAFETY: sigaction with a valid handler struct. SA_RESTART is
        // deliberately absent so interrupted syscalls fail with EINTR.
        unsafe {
            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = kick_noop as usize;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = 0;
            libc::sigaction(KICK_SIGNAL, &action, std::ptr::null_mut());
        }
    });
}

/// Interrupt `tid` out of any blocking call it is sitting in.
///
/// Best-effort: a thread that already exited yields `ESRCH`, which callers
/// ignore during shutdown.
pub fn kick(tid: Tid) -> io::Result<()> {
    // SAFETY: tgkill targets a thread of this process by id; the signal has
    // an installed no-op handler.
    let rc = unsafe { libc::syscall(libc::SYS_tgkill, libc::getpid(), tid, KICK_SIGNAL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_tid_is_stable_and_positive() {
        let a = current_tid();
        let b = current_tid();
        assert!(a > 0);
        assert_eq!(a, b);
    }

    #[test]
    fn tids_differ_across_threads() {
        let here = current_tid();
        let there = std::thread::spawn(current_tid).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn kick_of_dead_tid_reports_esrch() {
        install_kick_handler();
        // tid values this large are never allocated.
        let err = kick(i32::MAX - 1).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ESRCH));
    }

    #[test]
    fn kick_self_is_survivable() {
        install_kick_handler();
        kick(current_tid()).unwrap();
    }

    #[test]
    fn pin_to_current_cpu_succeeds() {
        // SAFETY: sched_getcpu has no failure modes beyond -1.
        let cpu = unsafe { libc::sched_getcpu() };
        if cpu >= 0 {
            pin_to_cpu(cpu as usize).unwrap();
        }
    }

    #[test]
    fn pin_to_absent_cpu_fails() {
        // Highest index representable in cpu_set_t; no test machine has it.
        assert!(matches!(
            pin_to_cpu(1023),
            Err(SetupError::Affinity { cpu: 1023, .. })
        ));
    }
}
