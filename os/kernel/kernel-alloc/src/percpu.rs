//! Per-core physical frame allocator with work stealing.

use crate::free_list::FreeList;
use crate::region::PhysRegion;
use crate::Fault;
use kernel_info::params::{ALLOC_JUNK, FREE_JUNK, MAX_CPUS};
use kernel_info::PhysAddr;
use kernel_sync::sched::{self, PreemptGuard};
use kernel_sync::{MutexGuard, RawSpin, SpinMutex};
use log::{debug, info};

/// Physical frame allocator with one free list per processing core.
///
/// Cores allocate from and free to their own list, so the common path
/// takes only the local lock. Frames go back to whichever core frees
/// them, deliberately *not* the core that allocated them. This avoids
/// frame-origin bookkeeping at the cost of drift that [`steal`](#stealing)
/// corrects lazily.
///
/// # Stealing
///
/// A core that finds its own list empty scans the other cores in a fixed
/// order, still holding its local lock, and takes half of the first
/// non-empty list it finds (rounded up, at least one frame). The scan
/// stops at the first donor even if a later core holds more; that is a
/// simplicity/latency trade-off, not a balancing guarantee.
///
/// # Preemption
///
/// All list manipulation runs with preemption disabled so the core id
/// used to pick the local list stays valid while its lock is held. The
/// installed scheduler must report core ids below
/// [`MAX_CPUS`](kernel_info::params::MAX_CPUS).
pub struct PerCpuAlloc {
    region: PhysRegion,
    cores: [SpinMutex<FreeList>; MAX_CPUS],
}

impl PerCpuAlloc {
    /// Take ownership of `region` and put every frame on a free list.
    ///
    /// Bring-up frees frame by frame through the same path as runtime
    /// `free`, so all frames initially land on the booting core's list;
    /// stealing spreads them out as other cores start allocating.
    #[must_use]
    pub fn new(region: PhysRegion) -> Self {
        let alloc = Self {
            region,
            cores: [const { SpinMutex::new(FreeList::new()) }; MAX_CPUS],
        };
        for index in 0..region.frame_count() {
            let freed = alloc.free(region.frame_addr(index));
            debug_assert!(freed.is_ok(), "bring-up frame failed validation");
        }
        info!(
            "per-cpu frame allocator: {} frames across {} cores",
            region.frame_count(),
            MAX_CPUS
        );
        alloc
    }

    /// Allocate one page frame, filled with [`ALLOC_JUNK`].
    ///
    /// Returns `None` only when no core has a free frame left; callers
    /// must handle out-of-memory.
    pub fn alloc(&self) -> Option<PhysAddr> {
        let preempt = PreemptGuard::new();
        let cpu = sched::current_cpu();

        let mut local = self.cores[cpu].lock();
        if local.is_empty() {
            self.steal(cpu, &mut local);
        }
        let frame = local.pop();
        drop(local);

        if let Some(pa) = frame {
            // Fill with junk to catch reads of uninitialized pages.
            // SAFETY: the frame was just popped, so nobody else owns it.
            unsafe { self.region.fill(pa, ALLOC_JUNK) };
        }
        drop(preempt);
        frame
    }

    /// Return the page frame based at `pa` to the current core's list,
    /// filled with [`FREE_JUNK`].
    ///
    /// # Errors
    /// [`Fault::Unaligned`] / [`Fault::OutOfRange`] when `pa` is not the
    /// base of a managed frame, a caller bug the kernel treats as fatal.
    pub fn free(&self, pa: PhysAddr) -> Result<(), Fault> {
        self.region.check(pa)?;

        // Fill with junk to catch dangling references.
        // SAFETY: validated above; the caller hands ownership back.
        unsafe { self.region.fill(pa, FREE_JUNK) };

        let preempt = PreemptGuard::new();
        let cpu = sched::current_cpu();
        // SAFETY: the frame is validated, junk-filled and unowned.
        unsafe { self.cores[cpu].lock().push(pa) };
        drop(preempt);
        Ok(())
    }

    /// Move frames from the first other core with a non-empty list onto
    /// `local` (the calling core's list, whose lock is already held).
    fn steal(&self, cpu: usize, local: &mut MutexGuard<'_, FreeList, RawSpin>) {
        for victim in 0..MAX_CPUS {
            if victim == cpu {
                continue;
            }
            let mut donor = self.cores[victim].lock();
            if donor.is_empty() {
                continue;
            }
            let take = donor.len().div_ceil(2);
            for _ in 0..take {
                if let Some(pa) = donor.pop() {
                    // SAFETY: ownership moves directly from one list to
                    // the other; the frame stays free throughout.
                    unsafe { local.push(pa) };
                }
            }
            debug!("cpu {cpu} stole {take} frames from cpu {victim}");
            return;
        }
    }

    /// The region this allocator manages.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> &PhysRegion {
        &self.region
    }

    /// Total number of free frames across all cores. Diagnostic only: the
    /// value may be stale by the time it is returned.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.cores.iter().map(|core| core.lock().len()).sum()
    }

    /// Number of free frames on one core's list. Diagnostic only.
    ///
    /// # Panics
    /// Panics if `cpu` is not below [`MAX_CPUS`].
    #[must_use]
    pub fn free_frames_on(&self, cpu: usize) -> usize {
        self.cores[cpu].lock().len()
    }
}
