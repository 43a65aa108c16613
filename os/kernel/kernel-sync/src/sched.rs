//! Scheduler hooks consumed by the locks and the resource managers.
//!
//! The kernel proper installs its scheduler/trap layer here once at boot;
//! everything downstream (sleep locks, the per-core allocator) reaches it
//! through free functions so no component carries a scheduler reference of
//! its own. Host-side tests install a std-threads implementation instead.
//!
//! With no scheduler installed the hooks fall back to single-core behavior:
//! core id 0, preemption control as a no-op, parking as a spin hint.

use crate::mutex::{Mutex, MutexGuard};
use crate::once_cell::SyncOnceCell;
use crate::{RawLock, RawUnlock};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// The scheduler/trap interface the synchronization layer consumes.
pub trait Scheduler: Sync {
    /// Identity of the currently executing core.
    ///
    /// Only stable while preemption is disabled; callers that use the id to
    /// index per-core state must hold a [`PreemptGuard`] across the access.
    fn cpu_id(&self) -> usize;

    /// Disable preemption on the current core. Nests; each call must be
    /// matched by one [`preempt_enable`](Self::preempt_enable).
    fn preempt_disable(&self);

    /// Re-enable preemption once the outermost disable is matched.
    fn preempt_enable(&self);

    /// Suspend the calling thread until `chan` is signaled.
    ///
    /// May return spuriously, and an [`unpark`](Self::unpark) may race
    /// ahead of the corresponding park; implementations must bound the wait
    /// and callers must re-check their condition in a loop.
    fn park(&self, chan: usize);

    /// Wake every thread currently parked on `chan`.
    fn unpark(&self, chan: usize);
}

static SCHEDULER: SyncOnceCell<&'static dyn Scheduler> = SyncOnceCell::new();

/// Install the process-wide scheduler. The first installation wins; the
/// effective scheduler is returned either way.
pub fn install(scheduler: &'static dyn Scheduler) -> &'static dyn Scheduler {
    *SCHEDULER.get_or_init(|| scheduler)
}

#[inline]
fn current() -> Option<&'static dyn Scheduler> {
    SCHEDULER.get().copied()
}

/// Identity of the currently executing core (0 when no scheduler is
/// installed). See [`Scheduler::cpu_id`] for the stability caveat.
#[inline]
#[must_use]
pub fn current_cpu() -> usize {
    current().map_or(0, Scheduler::cpu_id)
}

/// Suspend the calling thread until `chan` is signaled (spin hint when no
/// scheduler is installed). Callers re-check their condition in a loop.
#[inline]
pub fn park(chan: usize) {
    match current() {
        Some(s) => s.park(chan),
        None => core::hint::spin_loop(),
    }
}

/// Wake every thread currently parked on `chan`.
#[inline]
pub fn unpark(chan: usize) {
    if let Some(s) = current() {
        s.unpark(chan);
    }
}

/// RAII guard that disables preemption on creation and re-enables it on
/// drop. Nests through the scheduler's depth counting.
///
/// Not `Send`: the guard stands for a state of the core it was created on.
pub struct PreemptGuard {
    _not_send: PhantomData<*mut ()>,
}

impl Default for PreemptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl PreemptGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        if let Some(s) = current() {
            s.preempt_disable();
        }
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        if let Some(s) = current() {
            s.preempt_enable();
        }
    }
}

/// A mutex guard that also keeps preemption disabled while held.
///
/// Created via [`Mutex::lock_preempt`], which
///
/// 1. disables preemption (pinning the thread to its core), and
/// 2. acquires the underlying mutex,
///
/// releasing them in reverse order on drop. This is the acquisition mode
/// for locks guarding per-core state: the core id used to pick the lock
/// stays valid for as long as the lock is held.
pub struct PreemptMutex<'a, T, R: RawLock + RawUnlock> {
    // Field order is drop order: release the mutex before re-enabling
    // preemption.
    guard: MutexGuard<'a, T, R>,
    _preempt: PreemptGuard,
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Acquire the mutex with preemption disabled for the guard's lifetime.
    #[inline]
    pub fn lock_preempt(&self) -> PreemptMutex<'_, T, R> {
        let preempt = PreemptGuard::new();
        let guard = self.lock();
        PreemptMutex {
            guard,
            _preempt: preempt,
        }
    }
}

impl<T, R: RawLock + RawUnlock> Deref for PreemptMutex<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R: RawLock + RawUnlock> DerefMut for PreemptMutex<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
