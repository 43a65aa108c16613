use core::ptr::null_mut;
use kernel_info::PhysAddr;

/// Header stored at the beginning of every **free** frame.
///
/// A free frame carries no metadata besides its link to the next free
/// frame, so the list costs no memory beyond the frames themselves.
#[repr(C)]
pub(crate) struct FreeNode {
    /// Pointer to the next free frame (or null).
    next: *mut FreeNode,
}

/// An intrusive LIFO list of free frames plus its length.
///
/// # Invariants
/// - Every node is the base of a distinct managed frame.
/// - `count` equals the number of nodes reachable from `head`.
/// - A frame is on at most one list at a time; pushing transfers ownership
///   of the frame memory to the list.
pub(crate) struct FreeList {
    head: *mut FreeNode,
    count: usize,
}

// Safety: the list is always used under a lock; raw pointers are only
// accessed while locked.
unsafe impl Send for FreeList {}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self {
            head: null_mut(),
            count: 0,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Push the frame based at `pa`.
    ///
    /// # Safety
    /// `pa` must be the base of a valid, writable, otherwise-unowned frame.
    pub(crate) unsafe fn push(&mut self, pa: PhysAddr) {
        let node = pa.as_mut_ptr().cast::<FreeNode>();
        unsafe {
            (*node).next = self.head;
        }
        self.head = node;
        self.count += 1;
    }

    /// Pop the most recently pushed frame, if any.
    pub(crate) fn pop(&mut self) -> Option<PhysAddr> {
        if self.head.is_null() {
            return None;
        }
        let node = self.head;
        // SAFETY: a non-null head is a node a previous `push` linked in.
        self.head = unsafe { (*node).next };
        self.count -= 1;
        Some(PhysAddr::new(node as usize))
    }
}
