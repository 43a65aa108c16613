//! # Kernel synchronization primitives
//!
//! Two lock flavors behind one generic [`Mutex`], distinguished by how they
//! wait:
//!
//! * [`SpinMutex`] busy-waits and is meant for short, bounded critical
//!   sections that never sleep or perform I/O while held.
//! * [`SleepMutex`] suspends the calling thread through the installed
//!   [`sched::Scheduler`] and is meant for long holds, such as exclusive
//!   ownership of a buffer across a disk transfer.
//!
//! The [`sched`] module carries the scheduler hooks (core identity,
//! preemption control, park/unpark) that the resource managers consume, and
//! the [`sched::PreemptGuard`]/[`Mutex::lock_preempt`] pair for core-local
//! critical sections.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod mutex;
mod once_cell;
mod raw_sleep;
mod raw_spin;
pub mod sched;

pub use mutex::{Mutex, MutexGuard};
pub use once_cell::SyncOnceCell;
pub use raw_sleep::RawSleep;
pub use raw_spin::RawSpin;

/// A mutex that busy-waits while contended.
pub type SpinMutex<T> = Mutex<T, RawSpin>;

/// A mutex that suspends the calling thread while contended.
pub type SleepMutex<T> = Mutex<T, RawSleep>;

impl<T> SpinMutex<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

impl<T> SleepMutex<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSleep::new(), value)
    }
}

/// Lock acquisition half of a raw lock.
pub trait RawLock {
    /// Block (by spinning or sleeping) until the lock is held.
    fn raw_lock(&self);
    /// Try once; `true` when the lock was taken.
    fn raw_try_lock(&self) -> bool;
}

/// Lock release half of a raw lock.
pub trait RawUnlock {
    /// Release the lock.
    ///
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
