//! Std-backed [`Scheduler`] and an in-memory block device for the
//! integration tests.

#![allow(dead_code)]

use kernel_bcache::{BlockData, BlockDevice, DeviceError};
use kernel_info::params::BLOCK_SIZE;
use kernel_sync::sched::{self, Scheduler};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, OnceLock};
use std::time::Duration;

/// Implements park/unpark with a condition variable so sleep locks really
/// suspend. The wait is bounded (see [`Scheduler::park`]'s contract): an
/// unpark that races ahead of a park costs a timeout tick, never a hang.
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
}

impl Scheduler for TestScheduler {
    fn cpu_id(&self) -> usize {
        0
    }

    fn preempt_disable(&self) {}

    fn preempt_enable(&self) {}

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

/// An in-memory block device that counts transfers per block and can be
/// told to fail reads.
#[derive(Default)]
pub struct MemDisk {
    blocks: Mutex<HashMap<(u32, u32), [u8; BLOCK_SIZE]>>,
    reads: Mutex<HashMap<(u32, u32), usize>>,
    fail_reads: AtomicBool,
}

impl MemDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a block with a repeated fill byte.
    pub fn put(&self, dev: u32, blockno: u32, fill: u8) {
        self.blocks
            .lock()
            .unwrap()
            .insert((dev, blockno), [fill; BLOCK_SIZE]);
    }

    /// Stored contents of a block, if any write reached the device.
    pub fn contents(&self, dev: u32, blockno: u32) -> Option<[u8; BLOCK_SIZE]> {
        self.blocks.lock().unwrap().get(&(dev, blockno)).copied()
    }

    /// Number of successful device reads of one block.
    pub fn reads_of(&self, dev: u32, blockno: u32) -> usize {
        *self.reads.lock().unwrap().get(&(dev, blockno)).unwrap_or(&0)
    }

    /// Make every subsequent read fail (until turned off again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, dev: u32, blockno: u32, data: &mut BlockData) -> Result<(), DeviceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DeviceError::Read { dev, blockno });
        }
        *self.reads.lock().unwrap().entry((dev, blockno)).or_insert(0) += 1;
        let stored = self
            .blocks
            .lock()
            .unwrap()
            .get(&(dev, blockno))
            .copied()
            .unwrap_or([0; BLOCK_SIZE]);
        **data = stored;
        Ok(())
    }

    fn write_block(&self, dev: u32, blockno: u32, data: &BlockData) -> Result<(), DeviceError> {
        self.blocks.lock().unwrap().insert((dev, blockno), **data);
        Ok(())
    }
}
