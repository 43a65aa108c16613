use crate::cache::BufCache;
use crate::device::{BlockData, BlockDevice};
use crate::Error;
use core::ops::{Deref, DerefMut};
use kernel_sync::{MutexGuard, RawSleep};

/// An exclusively locked, referenced buffer: the only handle through
/// which block contents are read or written.
///
/// Holding a `Buf` means holding the slot's content sleep lock *and* one
/// unit of its reference count; both are given back when the `Buf` drops,
/// on every exit path. The drop also records the release time used for
/// eviction ranking once the last reference is gone.
pub struct Buf<'a, D: BlockDevice> {
    cache: &'a BufCache<D>,
    slot: usize,
    dev: u32,
    blockno: u32,
    /// `Some` until drop, which releases the content lock before the
    /// reference count.
    data: Option<MutexGuard<'a, BlockData, RawSleep>>,
}

impl<'a, D: BlockDevice> Buf<'a, D> {
    /// Sleep-acquire the slot's content lock. The caller has already taken
    /// the reference this buffer embodies.
    pub(crate) fn acquire(cache: &'a BufCache<D>, slot: usize, dev: u32, blockno: u32) -> Self {
        let data = cache.data_lock(slot).lock();
        Self {
            cache,
            slot,
            dev,
            blockno,
            data: Some(data),
        }
    }

    /// Device id of the cached block.
    #[must_use]
    pub const fn dev(&self) -> u32 {
        self.dev
    }

    /// Block number of the cached block.
    #[must_use]
    pub const fn blockno(&self) -> u32 {
        self.blockno
    }

    /// Persist the buffer's current contents to the device.
    ///
    /// Holding `&self` proves the content lock is held, so an unlocked
    /// write is unrepresentable.
    ///
    /// # Errors
    /// [`Error::Device`] when the transfer fails, propagated unmodified.
    pub fn write(&self) -> Result<(), Error> {
        self.cache
            .device()
            .write_block(self.dev, self.blockno, self.data())?;
        Ok(())
    }

    /// Keep the block resident past this buffer's lifetime by taking an
    /// extra reference that the returned [`Pinned`] token owns.
    ///
    /// Used by the filesystem log to hold blocks without blocking other
    /// threads' access to their contents.
    #[must_use]
    pub fn pin(&self) -> Pinned<'a, D> {
        self.cache.retain(self.slot);
        Pinned {
            cache: self.cache,
            slot: self.slot,
            dev: self.dev,
            blockno: self.blockno,
        }
    }

    fn data(&self) -> &BlockData {
        self.data.as_deref().expect("content lock held until drop")
    }

    fn data_mut(&mut self) -> &mut BlockData {
        self.data
            .as_deref_mut()
            .expect("content lock held until drop")
    }
}

impl<D: BlockDevice> Deref for Buf<'_, D> {
    type Target = BlockData;

    fn deref(&self) -> &BlockData {
        self.data()
    }
}

impl<D: BlockDevice> DerefMut for Buf<'_, D> {
    fn deref_mut(&mut self) -> &mut BlockData {
        self.data_mut()
    }
}

impl<D: BlockDevice> Drop for Buf<'_, D> {
    fn drop(&mut self) {
        // Release the content lock first, then the reference count.
        drop(self.data.take());
        self.cache.release(self.slot);
    }
}

/// A reference that keeps a block resident without locking its contents.
///
/// Created by [`Buf::pin`]; the reference is dropped when the token is,
/// so a pin can never leak its count, even on early-error paths.
pub struct Pinned<'a, D: BlockDevice> {
    cache: &'a BufCache<D>,
    slot: usize,
    dev: u32,
    blockno: u32,
}

impl<D: BlockDevice> Pinned<'_, D> {
    /// Device id of the pinned block.
    #[must_use]
    pub const fn dev(&self) -> u32 {
        self.dev
    }

    /// Block number of the pinned block.
    #[must_use]
    pub const fn blockno(&self) -> u32 {
        self.blockno
    }

    /// Explicitly release the pin (equivalent to dropping the token).
    pub fn unpin(self) {}
}

impl<D: BlockDevice> Drop for Pinned<'_, D> {
    fn drop(&mut self) {
        self.cache.release_pin(self.slot);
    }
}
