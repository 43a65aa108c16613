//! Globally-locked, reference-counted frame allocator (copy-on-write
//! support).

use crate::free_list::FreeList;
use crate::region::PhysRegion;
use crate::Fault;
use core::mem::size_of;
use core::ptr;
use kernel_info::params::{ALLOC_JUNK, FREE_JUNK, PAGE_SIZE};
use kernel_info::PhysAddr;
use kernel_sync::SpinMutex;
use log::info;

/// Free list plus the per-frame reference counts, all guarded by one lock.
struct RefCountInner {
    free: FreeList,
    /// Per-frame counts, carved from the head of the managed region.
    counts: *mut u32,
    frames: usize,
}

// Safety: only accessed through the allocator's single lock.
unsafe impl Send for RefCountInner {}

impl RefCountInner {
    #[inline]
    fn count(&self, frame: usize) -> u32 {
        debug_assert!(frame < self.frames);
        // SAFETY: `counts` covers `frames` entries; index checked above.
        unsafe { *self.counts.add(frame) }
    }

    #[inline]
    fn set_count(&mut self, frame: usize, value: u32) {
        debug_assert!(frame < self.frames);
        // SAFETY: as in `count`.
        unsafe { *self.counts.add(frame) = value }
    }
}

/// Frame allocator with shared ownership, enabling copy-on-write.
///
/// Every frame has a persistent reference count; [`Self::ref_add`] lets a
/// second owner share a frame without copying it, and [`Self::free`] only
/// returns the frame to the pool once the last owner lets go. One global
/// lock serializes all operations: this design trades the per-core
/// allocator's scalability for correct shared ownership. The two designs
/// are alternatives; a system runs exactly one of them.
pub struct RefCountAlloc {
    /// The usable frames, i.e. the region handed in minus the count table.
    region: PhysRegion,
    inner: SpinMutex<RefCountInner>,
}

impl RefCountAlloc {
    /// Take ownership of `region`, carve the reference-count table from
    /// its head, and put every remaining frame on the free list.
    ///
    /// # Panics
    /// Panics if the region is too small to hold the table and at least
    /// one usable frame, a configuration error rather than a runtime
    /// condition.
    #[must_use]
    pub fn new(region: PhysRegion) -> Self {
        let total = region.frame_count();
        let table_frames = (total * size_of::<u32>()).div_ceil(PAGE_SIZE);
        assert!(
            total > table_frames,
            "region too small for a refcount table"
        );

        let counts = region.frame_addr(0).as_mut_ptr().cast::<u32>();
        let usable = region.tail(table_frames);
        let frames = usable.frame_count();
        // SAFETY: the table frames were just reserved out of the region
        // and are never handed out as allocatable frames.
        unsafe {
            ptr::write_bytes(counts, 0, frames);
        }

        let mut inner = RefCountInner {
            free: FreeList::new(),
            counts,
            frames,
        };
        for index in 0..frames {
            // SAFETY: every usable frame is unowned at bring-up.
            unsafe { inner.free.push(usable.frame_addr(index)) };
        }
        info!(
            "refcounted frame allocator: {frames} frames usable, \
             {table_frames} reserved for counts"
        );

        Self {
            region: usable,
            inner: SpinMutex::new(inner),
        }
    }

    /// Allocate one page frame with a reference count of 1, filled with
    /// [`ALLOC_JUNK`]. Returns `None` when no frame is free.
    pub fn alloc(&self) -> Option<PhysAddr> {
        let mut inner = self.inner.lock();
        let pa = inner.free.pop()?;
        let frame = self.region.index_of(pa);
        debug_assert_eq!(inner.count(frame), 0);
        inner.set_count(frame, 1);
        drop(inner);

        // Fill with junk to catch reads of uninitialized pages.
        // SAFETY: the frame was just popped, so we are its only owner.
        unsafe { self.region.fill(pa, ALLOC_JUNK) };
        Some(pa)
    }

    /// Drop one reference to the frame based at `pa`.
    ///
    /// The frame is junk-filled and returned to the pool only when this
    /// was the last reference; with other owners remaining it merely
    /// decrements the count.
    ///
    /// # Errors
    /// [`Fault::Unaligned`] / [`Fault::OutOfRange`] for a bad address,
    /// [`Fault::RefcountUnderflow`] when the frame is not allocated.
    /// All are caller bugs the kernel treats as fatal.
    pub fn free(&self, pa: PhysAddr) -> Result<(), Fault> {
        let frame = self.region.check(pa)?;
        let mut inner = self.inner.lock();
        let count = inner.count(frame);
        if count == 0 {
            return Err(Fault::RefcountUnderflow(frame));
        }
        inner.set_count(frame, count - 1);
        if count == 1 {
            // Last owner gone. Fill with junk to catch dangling
            // references, then recycle.
            // SAFETY: count reached zero, so nobody references the frame;
            // the global lock serializes against re-allocation.
            unsafe {
                self.region.fill(pa, FREE_JUNK);
                inner.free.push(pa);
            }
        }
        Ok(())
    }

    /// Add one reference to the frame based at `pa`, sharing it with a
    /// further owner (the copy-on-write entry point: called when a forked
    /// address space maps the frame instead of copying it).
    ///
    /// # Errors
    /// [`Fault::Unaligned`] / [`Fault::OutOfRange`] for a bad address,
    /// [`Fault::RefcountUnderflow`] when the frame is not currently
    /// allocated (a free frame cannot gain owners).
    pub fn ref_add(&self, pa: PhysAddr) -> Result<(), Fault> {
        let frame = self.region.check(pa)?;
        let mut inner = self.inner.lock();
        let count = inner.count(frame);
        if count == 0 {
            return Err(Fault::RefcountUnderflow(frame));
        }
        inner.set_count(frame, count + 1);
        Ok(())
    }

    /// Current reference count of the frame based at `pa`. Diagnostic.
    ///
    /// # Errors
    /// [`Fault::Unaligned`] / [`Fault::OutOfRange`] for a bad address.
    pub fn ref_count(&self, pa: PhysAddr) -> Result<u32, Fault> {
        let frame = self.region.check(pa)?;
        Ok(self.inner.lock().count(frame))
    }

    /// The usable region (excluding the count table).
    #[inline]
    #[must_use]
    pub const fn region(&self) -> &PhysRegion {
        &self.region
    }

    /// Number of frames currently on the free list. Diagnostic only.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.inner.lock().free.len()
    }
}
