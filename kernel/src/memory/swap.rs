//! Swap-slot allocator: one page-sized slot per bit, backed by the ram disk
//! registered at `drivers::disk::SWAP_DISK_INDEX`.
//!
//! Grounded in `examples/original_source/pintos/vm/anon.c`'s swap_table /
//! swap_lock / SECTORS_PER_SLOT layout.

use alloc::vec::Vec;
use spin::Mutex;
use lazy_static::lazy_static;

use crate::drivers::disk::{self, SECTOR_SIZE, SWAP_DISK_INDEX};
use crate::memory::{VmError, PAGE_SIZE};

pub const SECTORS_PER_SLOT: u64 = PAGE_SIZE / SECTOR_SIZE as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapSlot(pub usize);

struct SwapBitmap {
    bits: Vec<u64>,
    slot_count: usize,
}

impl SwapBitmap {
    fn new(slot_count: usize) -> Self {
        Self {
            bits: alloc::vec![0u64; (slot_count + 63) / 64],
            slot_count,
        }
    }

    fn get(&self, slot: usize) -> bool {
        self.bits[slot / 64] & (1 << (slot % 64)) != 0
    }

    fn set(&mut self, slot: usize, used: bool) {
        let word = &mut self.bits[slot / 64];
        if used {
            *word |= 1 << (slot % 64);
        } else {
            *word &= !(1 << (slot % 64));
        }
    }

    fn allocate(&mut self) -> Option<usize> {
        for slot in 0..self.slot_count {
            if !self.get(slot) {
                self.set(slot, true);
                return Some(slot);
            }
        }
        None
    }
}

lazy_static! {
    static ref SWAP_TABLE: Mutex<SwapBitmap> = Mutex::new(SwapBitmap::new(0));
}

/// Sizes the swap bitmap from the swap device's sector count. Must run once
/// before any `allocate`/`free`/`read`/`write`.
pub fn init() {
    let sectors = {
        let mut disks = disk::DISK_MANAGER.lock();
        match disks.get_disk(SWAP_DISK_INDEX) {
            Some(d) => d.get_info().sectors,
            None => 0,
        }
    };
    let slot_count = (sectors / SECTORS_PER_SLOT) as usize;
    *SWAP_TABLE.lock() = SwapBitmap::new(slot_count);
    log::info!("swap: {} slots available", slot_count);
}

/// Reserves the first free slot. The bitmap lock is held only for the bit
/// scan; no disk I/O happens here.
pub fn allocate() -> Result<SwapSlot, VmError> {
    SWAP_TABLE
        .lock()
        .allocate()
        .map(SwapSlot)
        .ok_or(VmError::OutOfSwap)
}

/// Releases a slot. Caller must guarantee the slot is not referenced by any
/// page after this call.
pub fn free(slot: SwapSlot) {
    SWAP_TABLE.lock().set(slot.0, false);
}

/// Writes one page (`PAGE_SIZE` bytes starting at `kva`) into `slot`.
pub fn write(slot: SwapSlot, kva: *const u8) -> Result<(), VmError> {
    let buf = unsafe { core::slice::from_raw_parts(kva, PAGE_SIZE as usize) };
    let start_sector = slot.0 as u64 * SECTORS_PER_SLOT;
    let mut disks = disk::DISK_MANAGER.lock();
    let dev = disks.get_disk(SWAP_DISK_INDEX).ok_or(VmError::DiskIo)?;
    dev.write_sectors(start_sector, SECTORS_PER_SLOT as u32, buf)
        .map_err(|_| VmError::DiskIo)
}

/// Reads one page from `slot` into `PAGE_SIZE` bytes starting at `kva`.
pub fn read(slot: SwapSlot, kva: *mut u8) -> Result<(), VmError> {
    let buf = unsafe { core::slice::from_raw_parts_mut(kva, PAGE_SIZE as usize) };
    let start_sector = slot.0 as u64 * SECTORS_PER_SLOT;
    let mut disks = disk::DISK_MANAGER.lock();
    let dev = disks.get_disk(SWAP_DISK_INDEX).ok_or(VmError::DiskIo)?;
    dev.read_sectors(start_sector, SECTORS_PER_SLOT as u32, buf)
        .map_err(|_| VmError::DiskIo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_never_doubles_up() {
        let mut bm = SwapBitmap::new(4);
        let a = bm.allocate().unwrap();
        let b = bm.allocate().unwrap();
        assert_ne!(a, b);
        bm.set(a, false);
        let c = bm.allocate().unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn allocate_exhausts_then_frees() {
        let mut bm = SwapBitmap::new(2);
        bm.allocate().unwrap();
        bm.allocate().unwrap();
        assert!(bm.allocate().is_none());
        bm.set(0, false);
        assert_eq!(bm.allocate(), Some(0));
    }
}
