use crate::sched;
use crate::{RawLock, RawUnlock};
use core::sync::atomic::{AtomicBool, Ordering};

/// Sleep-capable exclusive lock state.
///
/// Contended acquisition parks the calling thread on the wait channel
/// derived from the lock's address instead of burning cycles; release
/// unparks every waiter on that channel and lets them re-contend. With no
/// scheduler installed, waiting degrades to a spin hint.
///
/// Intended for long holds (a buffer pinned across a disk transfer); never
/// acquire one of these while holding a spin lock.
pub struct RawSleep {
    held: AtomicBool,
}

impl Default for RawSleep {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSleep {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// The wait channel for this lock: its own address. Stable for the
    /// lock's lifetime, distinct per lock.
    #[inline]
    fn chan(&self) -> usize {
        core::ptr::from_ref(self) as usize
    }

    #[inline]
    pub fn lock(&self) {
        while self.held.swap(true, Ordering::Acquire) {
            sched::park(self.chan());
        }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        !self.held.swap(true, Ordering::Acquire)
    }

    /// # Safety
    /// The caller must currently hold the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
        sched::unpark(self.chan());
    }
}

impl RawLock for RawSleep {
    fn raw_lock(&self) {
        self.lock();
    }

    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }
}

impl RawUnlock for RawSleep {
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}
