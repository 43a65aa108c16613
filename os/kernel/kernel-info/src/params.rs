//! # Resource-Manager Parameters

/// Size of one disk block payload in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Number of buffer slots in the block cache.
///
/// Must comfortably exceed the worst-case number of blocks held
/// simultaneously by concurrent filesystem operations; running out of
/// evictable slots is treated as a kernel design fault, not a runtime
/// condition.
pub const NBUF: usize = 30;

/// Number of hash buckets the buffer pool is sharded across.
///
/// Prime, so that consecutive block numbers spread evenly over the shards.
pub const BUCKET_COUNT: usize = 13;

/// Size of one physical page frame in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of processing cores the per-core allocator provisions for.
pub const MAX_CPUS: usize = 8;

/// Byte pattern written over a page when it is handed out by `alloc`.
///
/// Catches reads of uninitialized page contents.
pub const ALLOC_JUNK: u8 = 0x05;

/// Byte pattern written over a page when it is returned via `free`.
///
/// Catches dangling references to freed pages.
pub const FREE_JUNK: u8 = 0x01;

const _: () = {
    assert!(BLOCK_SIZE.is_power_of_two());
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(NBUF > 0 && BUCKET_COUNT > 0);
    assert!(NBUF >= BUCKET_COUNT);
    assert!(MAX_CPUS >= 1);
    assert!(ALLOC_JUNK != FREE_JUNK);
    assert!(ALLOC_JUNK != 0 && FREE_JUNK != 0);
};
