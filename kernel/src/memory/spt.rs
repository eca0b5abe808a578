//! Supplemental page table: per-process map from user virtual page to page
//! descriptor (SPEC_FULL.md §4.5).

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use x86_64::VirtAddr;

use crate::memory::file;
use crate::memory::frame::{self, FrameId};
use crate::memory::mmu;
use crate::memory::page::{AnonState, FileState, Page, PageState, PageType, UninitKind};
use crate::memory::swap::{self, SwapSlot};
use crate::memory::{anon, page_round_down, VmError, PAGE_SIZE};
use crate::process::ProcessId;

pub struct Spt {
    pages: BTreeMap<u64, Page>,
}

impl Spt {
    pub const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    pub fn find(&self, va: VirtAddr) -> Option<&Page> {
        self.pages.get(&page_round_down(va).as_u64())
    }

    pub fn find_mut(&mut self, va: VirtAddr) -> Option<&mut Page> {
        self.pages.get_mut(&page_round_down(va).as_u64())
    }

    pub fn insert(&mut self, page: Page) -> Result<(), VmError> {
        let key = page.va.as_u64();
        if self.pages.contains_key(&key) {
            return Err(VmError::Overlap);
        }
        self.pages.insert(key, page);
        Ok(())
    }

    pub fn alloc_with_initializer(
        &mut self,
        page_type: PageType,
        va: VirtAddr,
        writable: bool,
    ) -> Result<(), VmError> {
        let va = page_round_down(va);
        let kind = match page_type {
            PageType::Anon => UninitKind::Anon,
            PageType::File => return Err(VmError::BadArgument),
        };
        self.insert(Page::new_uninit(va, writable, kind))
    }

    /// Removes `va`, tearing down its backing-specific resources (swap slot
    /// / write-back + mmap refcount) and, if resident, its frame and MMU
    /// mapping.
    pub fn remove(&mut self, va: VirtAddr) {
        let key = page_round_down(va).as_u64();
        if let Some(mut page) = self.pages.remove(&key) {
            let frame_kva = page.frame.and_then(frame::kva_of);
            page.destroy(frame_kva.map(|k| k.as_ptr()));
            if let Some(fid) = page.frame.take() {
                let _ = mmu::mmu_unmap(mmu::current(), page.va);
                let _ = frame::release(fid);
            }
        }
    }

    /// Destroys every page, in no particular order.
    pub fn kill(&mut self) {
        let keys: Vec<u64> = self.pages.keys().copied().collect();
        for key in keys {
            self.remove(VirtAddr::new(key));
        }
    }

    /// Snapshots every page for a fork, without touching the frame table or
    /// any backing store — just enough data (by value) to drive the copy
    /// once this `Spt`'s owning process-table entry is no longer locked.
    /// Nothing here mutates the source page, so the parent's own state
    /// (including a resident page's binding and a not-yet-faulted page's
    /// swap slot) is untouched by a fork.
    pub fn fork_entries(&self) -> Vec<ForkEntry> {
        self.pages
            .values()
            .map(|p| {
                let source = match (&p.state, p.frame) {
                    (_, Some(fid)) => ForkSource::Resident(fid),
                    (PageState::Uninit(UninitKind::Anon), None) => ForkSource::UninitAnon,
                    (PageState::Uninit(UninitKind::File(fs)), None) => {
                        ForkSource::UninitFile(fs.clone())
                    }
                    (PageState::Anon(anon), None) => ForkSource::AnonSlot(anon.slot),
                    (PageState::File(fs), None) => ForkSource::File(fs.clone()),
                };
                ForkEntry {
                    va: p.va,
                    writable: p.writable,
                    source,
                }
            })
            .collect()
    }
}

/// One parent page's fork-time copy plan (SPEC_FULL.md §9's fork rule),
/// captured by value so `fork_copy_page` needs no live reference into the
/// parent's `Spt` and therefore no process-table lock held across it.
pub struct ForkEntry {
    va: VirtAddr,
    writable: bool,
    source: ForkSource,
}

pub enum ForkSource {
    UninitAnon,
    UninitFile(FileState),
    /// Resident pages (anon or file) collapse to a fresh anonymous page in
    /// the child, matching the reference implementation's `vm_copy_claim_page`
    /// (see DESIGN.md's "Fork of a resident file-backed page" entry).
    Resident(FrameId),
    AnonSlot(Option<SwapSlot>),
    File(FileState),
}

/// Materializes one child page from a fork snapshot. Acquires its own frame
/// and does whatever backing I/O the source needs — reading a resident
/// frame's bytes or a swapped-out slot without disturbing either — entirely
/// without the process-table lock, which the caller (`process::fork`) has
/// already released by this point. This is also what keeps the parent's
/// page untouched: a not-yet-resident anon parent page's slot is read with
/// `swap::read` and never freed, unlike `Page::swap_in`, which would
/// otherwise consume it out from under the parent.
///
/// The executable/loader handle-substitution rule from SPEC_FULL.md §9 is
/// not exercised here: process creation and ELF loading are out of scope
/// (see DESIGN.md), so every `ForkSource::UninitFile`/`File` this sees in
/// practice is an mmap page, never a loader page.
pub fn fork_copy_page(dst_owner: ProcessId, entry: ForkEntry) -> Result<Page, VmError> {
    let ForkEntry { va, writable, source } = entry;
    match source {
        ForkSource::UninitAnon => return Ok(Page::new_uninit(va, writable, UninitKind::Anon)),
        ForkSource::UninitFile(fs) => {
            return Ok(Page::new_uninit(va, writable, UninitKind::File(fs)))
        }
        _ => {}
    }

    let dst_fid = frame::get_frame()?;
    let dst_kva = frame::kva_of(dst_fid).ok_or(VmError::OutOfMemory)?;

    let io_result: Result<(), VmError> = match &source {
        ForkSource::Resident(src_fid) => {
            frame::pin(*src_fid);
            if let Some(src_kva) = frame::kva_of(*src_fid) {
                unsafe {
                    core::ptr::copy_nonoverlapping(
                        src_kva.as_ptr::<u8>(),
                        dst_kva.as_mut_ptr::<u8>(),
                        PAGE_SIZE as usize,
                    );
                }
            }
            frame::unpin(*src_fid);
            Ok(())
        }
        ForkSource::AnonSlot(Some(slot)) => swap::read(*slot, dst_kva.as_mut_ptr::<u8>()),
        ForkSource::AnonSlot(None) => {
            anon::zero_fill(dst_kva.as_mut_ptr::<u8>());
            Ok(())
        }
        ForkSource::File(fs) => file::load(fs, dst_kva.as_mut_ptr::<u8>()),
        ForkSource::UninitAnon | ForkSource::UninitFile(_) => unreachable!(),
    };
    if let Err(e) = io_result {
        let _ = frame::release(dst_fid);
        return Err(e);
    }

    frame::bind(dst_fid, dst_owner, va);
    frame::unpin(dst_fid);

    let mut page = Page::new_uninit(va, writable, UninitKind::Anon);
    page.state = PageState::Anon(AnonState { slot: None });
    page.frame = Some(dst_fid);
    Ok(page)
}
