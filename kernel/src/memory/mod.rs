//! Virtual memory subsystem: supplemental page tables, the frame table and
//! its clock eviction policy, swap-slot allocation, and the anonymous/file
//! page backings. `vm_init()` brings the whole thing up after the physical
//! frame allocator and disk driver are ready.

pub mod paging;
pub mod frame_allocator;
pub mod mmu;
pub mod swap;
pub mod frame;
pub mod page;
pub mod anon;
pub mod file;
pub mod spt;
pub mod mmap;
pub mod fault;

use x86_64::VirtAddr;

/// Host page size, shared by every VM module. Distinct from
/// `allocator::PAGE_SIZE`, which sizes the unrelated kernel heap allocator.
pub const PAGE_SIZE: u64 = 4096;

/// Top of the user stack region (grows down from here).
pub const USER_STACK_TOP: u64 = 0x7FFF_FFFF_F000;

/// Maximum stack size the fault handler will grow to.
pub const STACK_MAX: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    BadArgument,
    Overlap,
    OutOfMemory,
    OutOfSwap,
    NoEvictableFrame,
    DiskIo,
    ShortRead,
}

/// One-time bring-up: sizes the swap bitmap and resets the frame table's
/// clock cursor. Must run after `frame_allocator::init_frame_allocator` and
/// `drivers::disk::DISK_MANAGER` have been initialized.
pub fn vm_init() {
    swap::init();
    frame::init();
    log::info!("vm: subsystem initialized");
}

pub fn page_round_down(addr: VirtAddr) -> VirtAddr {
    VirtAddr::new(addr.as_u64() & !(PAGE_SIZE - 1))
}

pub fn is_user_address(addr: VirtAddr) -> bool {
    addr.as_u64() != 0 && addr.as_u64() < 0x8000_0000_0000
}
