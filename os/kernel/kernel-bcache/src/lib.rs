//! # Disk Block Cache
//!
//! A fixed pool of buffer slots caching disk block contents in memory.
//! Caching avoids repeated device reads and, just as importantly, gives
//! every block a single synchronization point: all access to a block's
//! bytes goes through the one in-memory copy and its exclusive lock.
//!
//! ## Interface
//!
//! * [`BufCache::read`] returns a [`Buf`]: an exclusively locked buffer
//!   with valid contents for a `(device, block)` pair.
//! * [`Buf::write`] persists the buffer's contents to the device.
//! * Dropping the [`Buf`] releases the buffer; do not keep one longer than
//!   necessary, since only one thread at a time can use a given block.
//! * [`Buf::pin`]/[`Pinned`] keep a buffer resident without holding its
//!   content lock (used by the filesystem log).
//!
//! ## Locking
//!
//! The pool is sharded into [`params::BUCKET_COUNT`] hash buckets, each a
//! spin-locked list of slots, so cache *hits* on different buckets never
//! contend. Cache *misses* serialize on one global eviction lock, taken
//! strictly before any bucket lock; because at most one thread evicts at a
//! time, no two threads ever hold two bucket locks concurrently and
//! cross-bucket moves cannot deadlock. A buffer's payload is guarded by a
//! sleep lock, since waiting for it can span a whole device transfer;
//! bucket and eviction locks are never held across I/O or sleeps.
//!
//! [`params::BUCKET_COUNT`]: kernel_info::params::BUCKET_COUNT

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod buf;
mod cache;
mod device;

pub use buf::{Buf, Pinned};
pub use cache::BufCache;
pub use device::{BlockData, BlockDevice, DeviceError};

/// Block cache failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No slot with a zero reference count exists to evict.
    ///
    /// Fatal by policy: the pool is sized to exceed any legitimate
    /// concurrent working set, so hitting this means a kernel design
    /// invariant broke. The embedder halts rather than retry.
    #[error("buffer cache exhausted: no slot with zero references")]
    CacheExhausted,

    /// The device driver failed a transfer; propagated unmodified.
    #[error(transparent)]
    Device(#[from] DeviceError),
}
