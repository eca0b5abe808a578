//! Thin wrapper around the single active page table exposing the primitives
//! the VM core is written against (`mmu_map`, `mmu_unmap`, accessed/dirty bit
//! access). See SPEC_FULL.md section 1 for why there is one active table
//! rather than one per process.

use x86_64::structures::paging::{
    FrameAllocator, Mapper, Page, PageTable, PageTableFlags, PageTableIndex, PhysFrame, Size4KiB,
};
use x86_64::{PhysAddr, VirtAddr};

use crate::memory::paging::{MAPPER, PHYSICAL_MEMORY_OFFSET};
use crate::memory::VmError;

/// Adapts the bitmap allocator that owns every user data frame
/// (`memory::frame_allocator`) to the `x86_64` crate's `FrameAllocator`
/// trait, so `Mapper::map_to`'s intermediate page-table frames come from the
/// same pool instead of a second allocator racing it over the same physical
/// range.
struct BitmapAllocatorAdapter;

unsafe impl FrameAllocator<Size4KiB> for BitmapAllocatorAdapter {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        crate::memory::frame_allocator::allocate_frame()
    }
}

/// Placeholder identifying "the" address space a page belongs to. Every
/// public VM signature threads this through so a future port that adds real
/// per-process page tables only needs to change this type and the functions
/// below, not any SPT/fault-handler call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pml4Handle;

pub fn current() -> Pml4Handle {
    Pml4Handle
}

pub fn mmu_map(_pml4: Pml4Handle, uva: VirtAddr, phys: PhysAddr, writable: bool) -> Result<(), VmError> {
    let page = Page::<Size4KiB>::containing_address(uva);
    let frame = PhysFrame::containing_address(phys);
    let mut flags = PageTableFlags::PRESENT | PageTableFlags::USER_ACCESSIBLE;
    if writable {
        flags |= PageTableFlags::WRITABLE;
    }

    let mut mapper_guard = MAPPER.lock();
    let mapper = mapper_guard.as_mut().ok_or(VmError::BadArgument)?;
    let mut allocator = BitmapAllocatorAdapter;

    unsafe {
        mapper
            .map_to(page, frame, flags, &mut allocator)
            .map(|flush| flush.flush())
            .map_err(|_| VmError::OutOfMemory)
    }
}

pub fn mmu_unmap(_pml4: Pml4Handle, uva: VirtAddr) -> Result<PhysAddr, VmError> {
    let page = Page::<Size4KiB>::containing_address(uva);
    let mut mapper_guard = MAPPER.lock();
    let mapper = mapper_guard.as_mut().ok_or(VmError::BadArgument)?;
    mapper
        .unmap(page)
        .map(|(frame, flush)| {
            flush.flush();
            frame.start_address()
        })
        .map_err(|_| VmError::BadArgument)
}

pub fn mmu_present(pml4: Pml4Handle, uva: VirtAddr) -> bool {
    entry_flags(pml4, uva)
        .map(|f| f.contains(PageTableFlags::PRESENT))
        .unwrap_or(false)
}

pub fn mmu_dirty(pml4: Pml4Handle, uva: VirtAddr) -> bool {
    entry_flags(pml4, uva)
        .map(|f| f.contains(PageTableFlags::DIRTY))
        .unwrap_or(false)
}

pub fn mmu_accessed(pml4: Pml4Handle, uva: VirtAddr) -> bool {
    entry_flags(pml4, uva)
        .map(|f| f.contains(PageTableFlags::ACCESSED))
        .unwrap_or(false)
}

pub fn mmu_set_dirty(pml4: Pml4Handle, uva: VirtAddr, value: bool) {
    set_entry_flag(pml4, uva, PageTableFlags::DIRTY, value);
}

pub fn mmu_set_accessed(pml4: Pml4Handle, uva: VirtAddr, value: bool) {
    set_entry_flag(pml4, uva, PageTableFlags::ACCESSED, value);
}

/// Walks the active table by hand to reach the leaf PTE for `uva`. The
/// `Mapper` trait doesn't expose flag-only mutation on an existing entry, so
/// accessed/dirty inspection goes around it the same way
/// `paging::active_level_4_table` reaches the level-4 table: physical frames
/// are accessed through the bootloader's physical-memory offset mapping.
fn leaf_entry(uva: VirtAddr) -> Option<&'static mut x86_64::structures::paging::PageTableEntry> {
    let offset = PHYSICAL_MEMORY_OFFSET.lock().clone()?;
    let mapper_guard = MAPPER.lock();
    let _ = mapper_guard.as_ref()?;
    drop(mapper_guard);

    let (l4_frame, _) = x86_64::registers::control::Cr3::read();
    let indices = [
        PageTableIndex::new(((uva.as_u64() >> 39) & 0x1ff) as u16),
        PageTableIndex::new(((uva.as_u64() >> 30) & 0x1ff) as u16),
        PageTableIndex::new(((uva.as_u64() >> 21) & 0x1ff) as u16),
        PageTableIndex::new(((uva.as_u64() >> 12) & 0x1ff) as u16),
    ];

    let mut frame = l4_frame;
    for (depth, idx) in indices.iter().enumerate() {
        let table_virt = offset + frame.start_address().as_u64();
        let table: &mut PageTable = unsafe { &mut *table_virt.as_mut_ptr() };
        let entry = &mut table[*idx];
        if entry.is_unused() {
            return None;
        }
        if depth == 3 {
            return Some(unsafe { &mut *(entry as *mut _) });
        }
        frame = entry.frame().ok()?;
    }
    None
}

fn entry_flags(_pml4: Pml4Handle, uva: VirtAddr) -> Option<PageTableFlags> {
    leaf_entry(uva).map(|e| e.flags())
}

fn set_entry_flag(_pml4: Pml4Handle, uva: VirtAddr, flag: PageTableFlags, value: bool) {
    if let Some(entry) = leaf_entry(uva) {
        let mut flags = entry.flags();
        flags.set(flag, value);
        let frame = entry.frame().unwrap();
        entry.set_frame(frame, flags);
    }
}
