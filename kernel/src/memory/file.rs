//! File-backed page operations: lazy load on fault, write-back for mmap
//! pages on evict/destroy. Grounded in
//! `examples/original_source/pintos/vm/file.c`, with the shared mmap
//! context fix documented in SPEC_FULL.md §9 (the original reopens the file
//! once per page; this port reopens once per mapping).

use x86_64::VirtAddr;

use crate::fs::file;
use crate::memory::mmu;
use crate::memory::page::FileState;
use crate::memory::{VmError, PAGE_SIZE};

/// Loads `read_bytes` from the file at `offset` into `kva`, zero-filling the
/// remainder of the page.
pub fn load(fs: &FileState, kva: *mut u8) -> Result<(), VmError> {
    let buf = unsafe { core::slice::from_raw_parts_mut(kva, PAGE_SIZE as usize) };
    if fs.read_bytes > 0 {
        let n = file::file_read_at(&fs.file, &mut buf[..fs.read_bytes as usize], fs.offset)
            .map_err(|_| VmError::DiskIo)?;
        if n < fs.read_bytes as usize {
            buf[n..fs.read_bytes as usize].fill(0);
        }
    }
    buf[fs.read_bytes as usize..].fill(0);
    Ok(())
}

/// Writes the frame's bytes back to the file if this is a dirty mmap page.
/// Non-mmap (loader) pages and clean pages are left alone — the file is
/// already authoritative.
pub fn swap_out(fs: &FileState, va: VirtAddr, kva: *const u8) -> Result<(), VmError> {
    if !fs.is_mmap || fs.read_bytes == 0 {
        return Ok(());
    }
    if !mmu::mmu_dirty(mmu::current(), va) {
        return Ok(());
    }
    let buf = unsafe { core::slice::from_raw_parts(kva, fs.read_bytes as usize) };
    file::file_write_at(&fs.file, buf, fs.offset).map_err(|_| VmError::DiskIo)?;
    mmu::mmu_set_dirty(mmu::current(), va, false);
    Ok(())
}

/// Final teardown for a file-backed page: one last write-back if resident
/// and dirty, then drop this page's share of the mapping's shared file
/// handle, closing it once the last mapped page is gone.
pub fn destroy(fs: &FileState, va: VirtAddr, frame_kva: Option<*const u8>) {
    if let Some(kva) = frame_kva {
        let _ = swap_out(fs, va, kva);
    }
    if let Some(ctx) = &fs.mmap_ctx {
        crate::memory::mmap::release_context(ctx);
    }
}
