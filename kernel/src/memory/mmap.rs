//! `mmap`/`munmap` and the shared mmap file context (SPEC_FULL.md §4.4, §9).

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;
use x86_64::VirtAddr;

use crate::fs::file::{self, FileHandle};
use crate::memory::page::{FileState, Page, UninitKind};
use crate::memory::{is_user_address, page_round_down, VmError, PAGE_SIZE};
use crate::process::Process;

/// One reopened file handle shared by every page of a single mapping; closed
/// when the last mapped page is torn down. See SPEC_FULL.md §9 for why this
/// replaces the reference implementation's per-page `file_reopen`.
pub struct MmapContext {
    file: Option<FileHandle>,
    refcnt: usize,
}

pub struct MmapRegion {
    pub base: VirtAddr,
    pub page_count: usize,
    pub ctx: Arc<Mutex<MmapContext>>,
}

pub fn release_context(ctx: &Arc<Mutex<MmapContext>>) {
    let mut guard = ctx.lock();
    guard.refcnt = guard.refcnt.saturating_sub(1);
    if guard.refcnt == 0 {
        if let Some(f) = guard.file.take() {
            file::file_close(f);
        }
    }
}

pub fn do_mmap(
    proc: &mut Process,
    addr: VirtAddr,
    length: usize,
    writable: bool,
    backing_file: &FileHandle,
    offset: u64,
) -> Result<VirtAddr, VmError> {
    if length == 0 || addr.as_u64() % PAGE_SIZE != 0 || offset % PAGE_SIZE != 0 {
        return Err(VmError::BadArgument);
    }
    if !is_user_address(addr) {
        return Err(VmError::BadArgument);
    }

    let page_count = (length as u64 + PAGE_SIZE - 1) / PAGE_SIZE;

    for i in 0..page_count {
        let va = addr + i * PAGE_SIZE;
        if proc.spt.find(va).is_some() {
            return Err(VmError::Overlap);
        }
    }

    let file_length = file::file_length(backing_file).map_err(|_| VmError::BadArgument)?;

    let shared = file::file_reopen(backing_file);
    let ctx = Arc::new(Mutex::new(MmapContext {
        file: Some(shared.clone()),
        refcnt: 0,
    }));

    let mut installed = Vec::with_capacity(page_count as usize);
    for i in 0..page_count {
        let va = addr + i * PAGE_SIZE;
        let cursor = offset + i * PAGE_SIZE;
        let remaining_in_mapping = length as u64 - i * PAGE_SIZE;
        let step = core::cmp::min(remaining_in_mapping, PAGE_SIZE);
        let file_left = file_length.saturating_sub(cursor);
        let read_bytes = core::cmp::min(step, file_left) as u32;
        let zero_bytes = (PAGE_SIZE - read_bytes as u64) as u32;

        let fs = FileState {
            file: shared.clone(),
            offset: cursor,
            read_bytes,
            zero_bytes,
            is_mmap: true,
            mmap_ctx: Some(ctx.clone()),
        };
        let page = Page::new_uninit(va, writable, UninitKind::File(fs));

        if proc.spt.insert(page).is_err() {
            for done in &installed {
                proc.spt.remove(*done);
            }
            return Err(VmError::Overlap);
        }
        ctx.lock().refcnt += 1;
        installed.push(va);
    }

    proc.mmap_regions.push(MmapRegion {
        base: addr,
        page_count: page_count as usize,
        ctx,
    });

    Ok(addr)
}

pub fn munmap(proc: &mut Process, addr: VirtAddr) -> Result<(), VmError> {
    let addr = page_round_down(addr);
    let idx = proc
        .mmap_regions
        .iter()
        .position(|r| r.base == addr)
        .ok_or(VmError::BadArgument)?;
    let region = proc.mmap_regions.remove(idx);

    for i in 0..region.page_count as u64 {
        proc.spt.remove(region.base + i * PAGE_SIZE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_context_closes_file_on_last_release() {
        let ctx = Arc::new(Mutex::new(MmapContext { file: None, refcnt: 2 }));
        release_context(&ctx);
        assert_eq!(ctx.lock().refcnt, 1);
        release_context(&ctx);
        assert_eq!(ctx.lock().refcnt, 0);
    }
}
