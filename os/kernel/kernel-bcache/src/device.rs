use core::ops::{Deref, DerefMut};
use kernel_info::params::BLOCK_SIZE;

/// One block's payload bytes.
///
/// Aligned so the filesystem may reinterpret the payload as its on-disk
/// structures.
#[repr(C, align(8))]
pub struct BlockData([u8; BLOCK_SIZE]);

impl BlockData {
    pub(crate) const fn zeroed() -> Self {
        Self([0; BLOCK_SIZE])
    }
}

impl Deref for BlockData {
    type Target = [u8; BLOCK_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for BlockData {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A failed block transfer, reported by the device driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("read of block {blockno} on device {dev} failed")]
    Read { dev: u32, blockno: u32 },
    #[error("write of block {blockno} on device {dev} failed")]
    Write { dev: u32, blockno: u32 },
}

/// The synchronous block driver the cache reads through.
///
/// Both operations block the calling thread until the transfer completes;
/// the cache only invokes them while the caller holds the buffer's content
/// lock, so the driver never sees concurrent transfers for one block.
pub trait BlockDevice: Sync {
    /// Fill `data` with the contents of `blockno` on `dev`.
    ///
    /// # Errors
    /// [`DeviceError`] when the transfer fails; the cache propagates it
    /// unmodified.
    fn read_block(&self, dev: u32, blockno: u32, data: &mut BlockData) -> Result<(), DeviceError>;

    /// Persist `data` as the contents of `blockno` on `dev`.
    ///
    /// # Errors
    /// [`DeviceError`] when the transfer fails; the cache propagates it
    /// unmodified.
    fn write_block(&self, dev: u32, blockno: u32, data: &BlockData) -> Result<(), DeviceError>;
}
