//! Std-backed [`Scheduler`] and region helpers for the integration tests.

#![allow(dead_code)]

use kernel_alloc::PhysRegion;
use kernel_info::params::PAGE_SIZE;
use kernel_sync::sched::{self, Scheduler};
use std::alloc::Layout;
use std::cell::Cell;
use std::sync::{Condvar, Mutex, OnceLock};
use std::time::Duration;

thread_local! {
    static CPU: Cell<usize> = const { Cell::new(0) };
    static PREEMPT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Maps threads to cores via an explicit per-thread pin, counts preemption
/// depth per thread, and implements park/unpark with a condition variable.
///
/// The wait is bounded (see [`Scheduler::park`]'s contract): an unpark that
/// races ahead of a park costs a timeout tick, never a hang.
pub struct TestScheduler {
    parked: Mutex<()>,
    wakeup: Condvar,
}

impl TestScheduler {
    /// Install the shared instance (idempotent across tests in a binary).
    pub fn install() -> &'static Self {
        static CELL: OnceLock<TestScheduler> = OnceLock::new();
        let s = CELL.get_or_init(|| TestScheduler {
            parked: Mutex::new(()),
            wakeup: Condvar::new(),
        });
        sched::install(s);
        s
    }

    /// Pin the calling thread to `cpu` for the rest of its life.
    pub fn pin(cpu: usize) {
        CPU.with(|c| c.set(cpu));
    }

    /// Preemption-disable depth of the calling thread.
    pub fn preempt_depth() -> usize {
        PREEMPT_DEPTH.with(Cell::get)
    }
}

impl Scheduler for TestScheduler {
    fn cpu_id(&self) -> usize {
        CPU.with(Cell::get)
    }

    fn preempt_disable(&self) {
        PREEMPT_DEPTH.with(|d| d.set(d.get() + 1));
    }

    fn preempt_enable(&self) {
        PREEMPT_DEPTH.with(|d| d.set(d.get() - 1));
    }

    fn park(&self, _chan: usize) {
        let guard = self.parked.lock().unwrap();
        let _ = self
            .wakeup
            .wait_timeout(guard, Duration::from_millis(1))
            .unwrap();
    }

    fn unpark(&self, _chan: usize) {
        self.wakeup.notify_all();
    }
}

/// Allocate a page-aligned backing range and describe it as a region.
///
/// The backing memory is intentionally leaked: the allocator under test
/// owns it for the remainder of the process.
pub fn new_region(frames: usize) -> PhysRegion {
    let layout = Layout::from_size_align(frames * PAGE_SIZE, PAGE_SIZE).unwrap();
    let base = unsafe { std::alloc::alloc_zeroed(layout) };
    assert!(!base.is_null());
    unsafe { PhysRegion::new(base, frames * PAGE_SIZE) }
}

/// Read back a full page for junk-pattern inspection.
pub fn page_bytes(pa: kernel_info::PhysAddr) -> Vec<u8> {
    unsafe { std::slice::from_raw_parts(pa.as_mut_ptr(), PAGE_SIZE).to_vec() }
}
