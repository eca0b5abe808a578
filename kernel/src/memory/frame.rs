//! Global frame table and second-chance (clock) eviction policy
//! (SPEC_FULL.md §4.2). A frame's "weak" link to its bound page is just the
//! `(owner, va)` pair, resolved through the process table on demand; a
//! page's link to its frame is a stable `FrameId` index into this table's
//! slot vector. Neither link is a pointer, so there is no ownership cycle to
//! manage.

use alloc::vec::Vec;
use spin::Mutex;
use lazy_static::lazy_static;
use x86_64::structures::paging::{PhysFrame, Size4KiB};
use x86_64::VirtAddr;

use crate::memory::{frame_allocator, mmu, paging};
use crate::memory::VmError;
use crate::process::ProcessId;

pub type FrameId = usize;

struct FrameSlot {
    kva: VirtAddr,
    #[allow(dead_code)]
    phys: PhysFrame<Size4KiB>,
    owner: Option<ProcessId>,
    va: Option<VirtAddr>,
    pinned: bool,
}

struct FrameTable {
    slots: Vec<Option<FrameSlot>>,
    free_list: Vec<usize>,
    hand: usize,
}

impl FrameTable {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            hand: 0,
        }
    }

    fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

lazy_static! {
    static ref FRAME_TABLE: Mutex<FrameTable> = Mutex::new(FrameTable::new());
}

pub fn init() {
    *FRAME_TABLE.lock() = FrameTable::new();
}

fn phys_to_kva(phys: PhysFrame<Size4KiB>) -> Option<VirtAddr> {
    let offset = paging::PHYSICAL_MEMORY_OFFSET.lock().clone()?;
    Some(offset + phys.start_address().as_u64())
}

/// Obtains a frame from the physical pool, evicting if the pool is empty.
/// The returned frame is pinned and unbound (`owner = None`).
pub fn get_frame() -> Result<FrameId, VmError> {
    if let Some(phys) = frame_allocator::allocate_frame() {
        let kva = phys_to_kva(phys).ok_or(VmError::OutOfMemory)?;
        let mut table = FRAME_TABLE.lock();
        let slot = FrameSlot {
            kva,
            phys,
            owner: None,
            va: None,
            pinned: true,
        };
        return Ok(insert_slot(&mut table, slot));
    }
    evict()
}

fn insert_slot(table: &mut FrameTable, slot: FrameSlot) -> FrameId {
    if let Some(id) = table.free_list.pop() {
        table.slots[id] = Some(slot);
        id
    } else {
        table.slots.push(Some(slot));
        table.slots.len() - 1
    }
}

/// Binds a just-obtained frame to `owner`/`va`. Leaves `pinned` untouched —
/// callers unpin once the MMU mapping is installed.
pub fn bind(fid: FrameId, owner: ProcessId, va: VirtAddr) {
    let mut table = FRAME_TABLE.lock();
    if let Some(Some(slot)) = table.slots.get_mut(fid) {
        slot.owner = Some(owner);
        slot.va = Some(va);
    }
}

/// Pins a frame so the eviction scan skips it. Paired with `unpin`; used to
/// bracket a read of another frame's bytes (e.g. fork's resident-page copy)
/// against a concurrent eviction picking it mid-copy.
pub fn pin(fid: FrameId) {
    let mut table = FRAME_TABLE.lock();
    if let Some(Some(slot)) = table.slots.get_mut(fid) {
        slot.pinned = true;
    }
}

pub fn unpin(fid: FrameId) {
    let mut table = FRAME_TABLE.lock();
    if let Some(Some(slot)) = table.slots.get_mut(fid) {
        slot.pinned = false;
    }
}

pub fn kva_of(fid: FrameId) -> Option<VirtAddr> {
    let table = FRAME_TABLE.lock();
    table.slots.get(fid)?.as_ref().map(|s| s.kva)
}

pub fn phys_of(fid: FrameId) -> Option<PhysFrame<Size4KiB>> {
    let table = FRAME_TABLE.lock();
    table.slots.get(fid)?.as_ref().map(|s| s.phys)
}

/// Returns a frame to the physical pool. Requires the frame to already be
/// unbound (`owner = None`); the SPT clears the binding before calling this.
pub fn free_frame(fid: FrameId) -> Result<(), VmError> {
    let mut table = FRAME_TABLE.lock();
    let slot = table.slots.get(fid).and_then(|s| s.as_ref()).ok_or(VmError::BadArgument)?;
    if slot.owner.is_some() {
        return Err(VmError::BadArgument);
    }
    let phys = slot.phys;
    table.slots[fid] = None;
    table.free_list.push(fid);
    drop(table);
    frame_allocator::deallocate_frame(phys);
    Ok(())
}

/// Unbinds and frees a frame in one call — the common case when the SPT
/// removes a resident page outright (not evicting it for reuse).
pub fn release(fid: FrameId) -> Result<(), VmError> {
    {
        let mut table = FRAME_TABLE.lock();
        if let Some(Some(slot)) = table.slots.get_mut(fid) {
            slot.owner = None;
            slot.va = None;
        }
    }
    free_frame(fid)
}

/// Second-chance clock eviction. Scans from the persistent cursor, clearing
/// the accessed bit on first visit and evicting the first frame found with
/// it already clear. The victim is written out through its page's backing
/// with the frame-table lock released, then unmapped and unbound; it is
/// returned pinned and unbound for the caller to rebind.
fn evict() -> Result<FrameId, VmError> {
    let victim = {
        let mut table = FRAME_TABLE.lock();
        let len = table.slots.len();
        if len == 0 || table.live_count() == 0 {
            return Err(VmError::NoEvictableFrame);
        }

        let mut found = None;
        let max_scans = 2 * len + 2;
        for _ in 0..max_scans {
            let idx = table.hand;
            table.hand = (table.hand + 1) % len;

            let candidate = match table.slots[idx].as_ref() {
                Some(slot) if !slot.pinned && slot.va.is_some() => {
                    Some((slot.owner.unwrap(), slot.va.unwrap(), slot.kva))
                }
                _ => None,
            };

            if let Some((owner, va, kva)) = candidate {
                if mmu::mmu_accessed(mmu::current(), va) {
                    mmu::mmu_set_accessed(mmu::current(), va, false);
                    continue;
                }
                if let Some(Some(slot)) = table.slots.get_mut(idx) {
                    slot.pinned = true;
                }
                found = Some((idx, owner, va, kva));
                break;
            }
        }
        found.ok_or(VmError::NoEvictableFrame)?
    };

    let (victim_id, owner, va, kva) = victim;

    // The process-table lock is taken twice here, each time only long
    // enough to clone a plan or commit its result — never across the actual
    // disk write below (SPEC_FULL §5).
    let plan = crate::process::with_process(owner, |proc| {
        proc.spt.find(va).map(|page| page.swap_out_plan())
    })
    .flatten();

    let io_result: Result<(), VmError> = match plan {
        Some(crate::memory::page::SwapOutPlan::Anon) => {
            match crate::memory::anon::swap_out_detached(kva.as_ptr()) {
                Ok(slot) => {
                    crate::process::with_process_mut(owner, |proc| {
                        if let Some(page) = proc.spt.find_mut(va) {
                            page.commit_anon_slot(slot);
                        }
                    });
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Some(crate::memory::page::SwapOutPlan::File(fs)) => {
            crate::memory::file::swap_out(&fs, va, kva.as_ptr())
        }
        Some(crate::memory::page::SwapOutPlan::None) | None => Ok(()),
    };
    io_result?;

    let _ = mmu::mmu_unmap(mmu::current(), va);
    crate::process::with_process_mut(owner, |proc| {
        if let Some(page) = proc.spt.find_mut(va) {
            page.frame = None;
        }
    });

    let mut table = FRAME_TABLE.lock();
    if let Some(Some(slot)) = table.slots.get_mut(victim_id) {
        slot.owner = None;
        slot.va = None;
    }

    Ok(victim_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_cursor_always_legal() {
        let table = FrameTable::new();
        assert_eq!(table.hand, 0);
    }
}
