use crate::buf::Buf;
use crate::device::{BlockData, BlockDevice};
use crate::Error;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use kernel_info::params::{BUCKET_COUNT, NBUF};
use kernel_sync::{SleepMutex, SpinMutex};
use log::{debug, info};

/// Sentinel for "no slot" in the bucket index lists.
const NIL: usize = usize::MAX;

/// One buffer slot of the fixed pool.
///
/// The payload lives behind its own sleep lock. All other fields are
/// metadata guarded by spin locks rather than ownership: a field is only
/// *written* while holding the bucket lock the slot currently belongs to
/// (identity, links, reference count, stamp), or, during eviction, the
/// global eviction lock plus the relevant bucket locks. They are atomics
/// so the eviction scan may *read* them from outside the owning bucket;
/// every such read is either re-verified under the proper lock or already
/// serialized by the eviction lock.
struct BufSlot {
    /// Device id of the cached block. With `blockno`, the slot's identity.
    dev: AtomicU32,
    /// Block number of the cached block.
    blockno: AtomicU32,
    /// Whether the payload holds the block's current contents. Cleared on
    /// eviction; set once per caching period under the content lock.
    valid: AtomicBool,
    /// Live references (buffers handed out plus pins). A slot is evictable
    /// exactly while this is zero.
    refcnt: AtomicU32,
    /// Logical time of the last release-to-zero; eviction evicts the
    /// smallest.
    stamp: AtomicU64,
    /// Next slot in the owning bucket's list, or [`NIL`].
    next: AtomicUsize,
    /// Previous slot in the owning bucket's list, or [`NIL`].
    prev: AtomicUsize,
    /// The block payload, exclusively owned by whoever holds this lock.
    data: SleepMutex<BlockData>,
}

impl BufSlot {
    const fn new() -> Self {
        Self {
            dev: AtomicU32::new(0),
            blockno: AtomicU32::new(0),
            valid: AtomicBool::new(false),
            refcnt: AtomicU32::new(0),
            stamp: AtomicU64::new(0),
            next: AtomicUsize::new(NIL),
            prev: AtomicUsize::new(NIL),
            data: SleepMutex::new(BlockData::zeroed()),
        }
    }
}

/// One hash shard: the head of a doubly-linked list of slot indices.
///
/// A slot is always linked in exactly the bucket its current identity
/// hashes to.
struct Bucket {
    first: usize,
}

/// The sharded disk block cache. See the crate docs for the locking story.
pub struct BufCache<D: BlockDevice> {
    device: D,
    slots: [BufSlot; NBUF],
    buckets: [SpinMutex<Bucket>; BUCKET_COUNT],
    /// Serializes all evictions. Taken strictly before any bucket lock;
    /// since at most one thread holds it, at most one thread ever holds
    /// two bucket locks, which rules out cross-bucket deadlock.
    evict: SpinMutex<()>,
    /// Logical release clock. Starts at 1 so the initial stamp of 0 always
    /// reads as "older than any release".
    ticks: AtomicU64,
}

impl<D: BlockDevice> BufCache<D> {
    /// Build the cache over `device` with every slot empty.
    #[must_use]
    pub fn new(device: D) -> Self {
        let cache = Self {
            device,
            slots: [const { BufSlot::new() }; NBUF],
            buckets: [const { SpinMutex::new(Bucket { first: NIL }) }; BUCKET_COUNT],
            evict: SpinMutex::new(()),
            ticks: AtomicU64::new(1),
        };
        // All slots start with identity (0, 0), which hashes to bucket 0;
        // they migrate to their proper buckets as they are evicted into
        // service.
        {
            let mut bucket = cache.buckets[0].lock();
            for index in 0..NBUF {
                cache.push_front(&mut bucket, index);
            }
        }
        info!("block cache: {NBUF} buffers over {BUCKET_COUNT} buckets");
        cache
    }

    /// Return an exclusively locked buffer with valid contents for
    /// `(dev, blockno)`, reading through to the device on first access.
    ///
    /// Contents are read once per caching period; there is no automatic
    /// revalidation afterwards.
    ///
    /// # Errors
    /// [`Error::CacheExhausted`] when no slot can be evicted (fatal by
    /// policy), or [`Error::Device`] when the read-through fails. In both
    /// cases all bookkeeping is rolled back.
    pub fn read(&self, dev: u32, blockno: u32) -> Result<Buf<'_, D>, Error> {
        let slot = self.get(dev, blockno)?;
        let mut buf = Buf::acquire(self, slot, dev, blockno);
        if !self.slots[slot].valid.load(Ordering::Relaxed) {
            self.device.read_block(dev, blockno, &mut buf)?;
            self.slots[slot].valid.store(true, Ordering::Relaxed);
        }
        Ok(buf)
    }

    /// Find or allocate the slot caching `(dev, blockno)` and take a
    /// reference on it. The caller acquires the content lock afterwards,
    /// outside of any spin lock.
    fn get(&self, dev: u32, blockno: u32) -> Result<usize, Error> {
        let bi = Self::bucket_of(blockno);

        // Fast path: a bucket-local hit takes no global lock, so hits on
        // different buckets never contend with each other.
        {
            let bucket = self.buckets[bi].lock();
            if let Some(slot) = self.scan_bucket(&bucket, dev, blockno) {
                self.slots[slot].refcnt.fetch_add(1, Ordering::Relaxed);
                return Ok(slot);
            }
        }

        // Miss. The fixed order is eviction lock before bucket lock, the
        // same order every other evicting thread uses.
        let evict = self.evict.lock();
        let mut bucket = self.buckets[bi].lock();

        // Re-scan: another miss on the same block may have inserted it
        // between the two phases, turning ours into a hit.
        if let Some(slot) = self.scan_bucket(&bucket, dev, blockno) {
            self.slots[slot].refcnt.fetch_add(1, Ordering::Relaxed);
            return Ok(slot);
        }

        let slot = self.evict_into(&mut bucket, bi, dev, blockno)?;
        drop(bucket);
        drop(evict);
        Ok(slot)
    }

    /// Walk one bucket's list for a slot with the given identity. The
    /// bucket's lock must be held (witnessed by the `&Bucket` borrow).
    fn scan_bucket(&self, bucket: &Bucket, dev: u32, blockno: u32) -> Option<usize> {
        let mut index = bucket.first;
        while index != NIL {
            let slot = &self.slots[index];
            if slot.dev.load(Ordering::Relaxed) == dev
                && slot.blockno.load(Ordering::Relaxed) == blockno
            {
                return Some(index);
            }
            index = slot.next.load(Ordering::Relaxed);
        }
        None
    }

    /// Repurpose the least-recently-released unreferenced slot for
    /// `(dev, blockno)` and link it into `bucket` (index `bi`, lock held).
    /// The eviction lock must be held.
    fn evict_into(
        &self,
        bucket: &mut Bucket,
        bi: usize,
        dev: u32,
        blockno: u32,
    ) -> Result<usize, Error> {
        loop {
            // Scan the whole pool for the zero-reference slot with the
            // oldest release stamp; the first minimum found wins ties.
            let mut victim: Option<(usize, u64)> = None;
            for (index, slot) in self.slots.iter().enumerate() {
                if slot.refcnt.load(Ordering::Relaxed) != 0 {
                    continue;
                }
                let stamp = slot.stamp.load(Ordering::Relaxed);
                if victim.is_none_or(|(_, oldest)| stamp < oldest) {
                    victim = Some((index, stamp));
                }
            }
            let Some((index, _)) = victim else {
                return Err(Error::CacheExhausted);
            };

            let slot = &self.slots[index];
            let old_dev = slot.dev.load(Ordering::Relaxed);
            let old_blockno = slot.blockno.load(Ordering::Relaxed);
            let vb = Self::bucket_of(old_blockno);

            if vb == bi {
                // The victim lives in the destination bucket, whose lock
                // we already hold; a racing hit would need this same lock,
                // so the refcnt the scan observed is still authoritative.
                self.unlink(bucket, index);
            } else {
                // The scan read the victim's refcnt without its bucket
                // lock held; a bucket-local hit may have taken a reference
                // since. Re-verify under that lock, falling back to the
                // next candidate if the slot was revived.
                let mut vbucket = self.buckets[vb].lock();
                if slot.refcnt.load(Ordering::Relaxed) != 0 {
                    continue;
                }
                self.unlink(&mut vbucket, index);
            }

            // Unlinked and zero-referenced: nobody can reach the slot, so
            // rebinding its identity is race-free.
            debug!(
                "evict slot {index}: ({old_dev},{old_blockno}) -> ({dev},{blockno})"
            );
            slot.dev.store(dev, Ordering::Relaxed);
            slot.blockno.store(blockno, Ordering::Relaxed);
            slot.valid.store(false, Ordering::Relaxed);
            slot.refcnt.store(1, Ordering::Relaxed);
            self.push_front(bucket, index);
            return Ok(index);
        }
    }

    /// Link `index` at the head of `bucket` (lock held), so the list stays
    /// ordered by recency of insertion.
    fn push_front(&self, bucket: &mut Bucket, index: usize) {
        let old = bucket.first;
        self.slots[index].next.store(old, Ordering::Relaxed);
        self.slots[index].prev.store(NIL, Ordering::Relaxed);
        if old != NIL {
            self.slots[old].prev.store(index, Ordering::Relaxed);
        }
        bucket.first = index;
    }

    /// Unlink `index` from `bucket` (lock held).
    fn unlink(&self, bucket: &mut Bucket, index: usize) {
        let next = self.slots[index].next.load(Ordering::Relaxed);
        let prev = self.slots[index].prev.load(Ordering::Relaxed);
        if prev == NIL {
            bucket.first = next;
        } else {
            self.slots[prev].next.store(next, Ordering::Relaxed);
        }
        if next != NIL {
            self.slots[next].prev.store(prev, Ordering::Relaxed);
        }
    }

    /// Drop one reference (a buffer release). When the count reaches zero
    /// the slot is stamped with the current logical time for LRU ranking.
    ///
    /// The caller must still hold the reference being dropped, which keeps
    /// the slot's identity (and thus its bucket) stable.
    pub(crate) fn release(&self, slot: usize) {
        let s = &self.slots[slot];
        let bi = Self::bucket_of(s.blockno.load(Ordering::Relaxed));
        let _bucket = self.buckets[bi].lock();
        let previous = s.refcnt.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "released a buffer with no references");
        if previous == 1 {
            s.stamp
                .store(self.ticks.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
        }
    }

    /// Take an extra reference (a pin), keeping the slot resident without
    /// touching its content lock.
    pub(crate) fn retain(&self, slot: usize) {
        let s = &self.slots[slot];
        let bi = Self::bucket_of(s.blockno.load(Ordering::Relaxed));
        let _bucket = self.buckets[bi].lock();
        s.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a pin reference. Unlike [`release`](Self::release) this never
    /// stamps the slot: pins are bookkeeping, not recency signals.
    pub(crate) fn release_pin(&self, slot: usize) {
        let s = &self.slots[slot];
        let bi = Self::bucket_of(s.blockno.load(Ordering::Relaxed));
        let _bucket = self.buckets[bi].lock();
        let previous = s.refcnt.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "unpinned a buffer with no references");
    }

    pub(crate) const fn data_lock(&self, slot: usize) -> &SleepMutex<BlockData> {
        &self.slots[slot].data
    }

    /// The device this cache reads through.
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    const fn bucket_of(blockno: u32) -> usize {
        blockno as usize % BUCKET_COUNT
    }
}
