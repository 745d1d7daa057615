//! Condvar helper-registration protocol.
//!
//! A thread that is about to do work a condition variable's waiters depend
//! on can declare itself a *helper* for that condvar; the kernel then lets
//! it inherit the priority of the highest waiter while it is blocked
//! elsewhere, bounding inversion across the condvar. The registration table
//! is owned and serialized by the kernel — this module only issues the
//! add/del calls and classifies their failures.
//!
//! Registration is advisory: buffer correctness never depends on the helper
//! set, so every error here is absorbed by callers (log and continue).

use std::io;

use thiserror::Error;

use crate::buffer::CvHandle;

/// Kernel thread identity (what `gettid` returns).
pub type Tid = libc::pid_t;

/// Futex multiplexed op managing a condvar's helper set (out-of-tree).
const FUTEX_COND_HELPER_MAN: libc::c_long = 13;
const FUTEX_PRIVATE_FLAG: libc::c_long = 128;

/// `val3` selector for the helper-management op.
const HELPER_OP_ADD: libc::c_long = 1;
const HELPER_OP_DEL: libc::c_long = 0;

/// Why a helper registration call failed. Never fatal.
#[derive(Debug, Error)]
pub enum HelperError {
    /// The target identity is not a live thread (or was never registered).
    #[error("thread {tid} is not a valid helper target")]
    InvalidTid { tid: Tid },
    /// The kernel's registration table is exhausted.
    #[error("helper registration table exhausted")]
    TableFull,
    /// The running kernel does not implement the helper-management op.
    #[error("helper registration unsupported by this kernel")]
    Unsupported,
    /// Any other kernel-reported failure.
    #[error("helper registration failed: {0}")]
    Os(#[from] io::Error),
}

/// Client for the helper add/del operations.
///
/// Selected once at configuration time: the real futex client when the
/// priority-inheritance feature is enabled, the null client when it is not.
/// Call sites never branch on the feature flag.
pub trait HelperClient: Send + Sync {
    /// Declare `tid` a helper for `cv`.
    fn add(&self, cv: CvHandle, tid: Tid) -> Result<(), HelperError>;

    /// Reverse a prior registration. Must be called by the registering
    /// thread before it exits, or later observers see a stale helper.
    fn del(&self, cv: CvHandle, tid: Tid) -> Result<(), HelperError>;
}

/// Real client issuing the `FUTEX_COND_HELPER_MAN` op.
#[derive(Debug, Default, Clone, Copy)]
pub struct FutexHelperClient;

impl FutexHelperClient {
    fn manage(cv: CvHandle, tid: Tid, op: libc::c_long) -> Result<(), HelperError> {
        // SAFETY: the handle is the address of a live condvar owned by the
        // buffer for the whole run; the kernel treats it as an opaque futex
        // word and never writes through it for this op.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_futex,
                cv.as_usize(),
                FUTEX_COND_HELPER_MAN | FUTEX_PRIVATE_FLAG,
                tid as libc::c_long,
                0usize,
                0usize,
                op,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(classify(io::Error::last_os_error(), tid))
        }
    }
}

impl HelperClient for FutexHelperClient {
    fn add(&self, cv: CvHandle, tid: Tid) -> Result<(), HelperError> {
        Self::manage(cv, tid, HELPER_OP_ADD)
    }

    fn del(&self, cv: CvHandle, tid: Tid) -> Result<(), HelperError> {
        Self::manage(cv, tid, HELPER_OP_DEL)
    }
}

/// Feature-gate client: both operations succeed without touching the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHelperClient;

impl HelperClient for NullHelperClient {
    fn add(&self, _cv: CvHandle, _tid: Tid) -> Result<(), HelperError> {
        Ok(())
    }

    fn del(&self, _cv: CvHandle, _tid: Tid) -> Result<(), HelperError> {
        Ok(())
    }
}

fn classify(err: io::Error, tid: Tid) -> HelperError {
    match err.raw_os_error() {
        Some(libc::ESRCH) | Some(libc::EINVAL) => HelperError::InvalidTid { tid },
        Some(libc::ENOMEM) | Some(libc::ENOSPC) => HelperError::TableFull,
        Some(libc::ENOSYS) => HelperError::Unsupported,
        _ => HelperError::Os(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CircularBuffer;

    fn handle() -> CvHandle {
        // A throwaway buffer just to mint a real condvar identity.
        CircularBuffer::<u32>::with_capacity(1)
            .unwrap()
            .not_empty_handle()
    }

    #[test]
    fn null_client_accepts_everything() {
        let client = NullHelperClient;
        let cv = handle();
        client.add(cv, 1).unwrap();
        client.del(cv, 1).unwrap();
        client.del(cv, 99_999).unwrap();
    }

    #[test]
    fn errno_classification() {
        let tid = 42;
        assert!(matches!(
            classify(io::Error::from_raw_os_error(libc::ESRCH), tid),
            HelperError::InvalidTid { tid: 42 }
        ));
        assert!(matches!(
            classify(io::Error::from_raw_os_error(libc::ENOMEM), tid),
            HelperError::TableFull
        ));
        assert!(matches!(
            classify(io::Error::from_raw_os_error(libc::ENOSPC), tid),
            HelperError::TableFull
        ));
        assert!(matches!(
            classify(io::Error::from_raw_os_error(libc::ENOSYS), tid),
            HelperError::Unsupported
        ));
        assert!(matches!(
            classify(io::Error::from_raw_os_error(libc::EPERM), tid),
            HelperError::Os(_)
        ));
    }
}
