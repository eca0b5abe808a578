//! Page descriptor and its uninit -> typed state machine (SPEC_FULL.md §9).

use alloc::sync::Arc;
use spin::Mutex;
use x86_64::VirtAddr;

use crate::fs::file::FileHandle;
use crate::memory::mmap::MmapContext;
use crate::memory::swap::SwapSlot;
use crate::memory::frame::FrameId;
use crate::memory::VmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Anon,
    File,
}

pub struct AnonState {
    pub slot: Option<SwapSlot>,
}

#[derive(Clone)]
pub struct FileState {
    pub file: FileHandle,
    pub offset: u64,
    pub read_bytes: u32,
    pub zero_bytes: u32,
    pub is_mmap: bool,
    pub mmap_ctx: Option<Arc<Mutex<MmapContext>>>,
}

pub enum UninitKind {
    Anon,
    File(FileState),
}

pub enum PageState {
    Uninit(UninitKind),
    Anon(AnonState),
    File(FileState),
}

impl PageState {
    pub fn page_type(&self) -> PageType {
        match self {
            PageState::Uninit(UninitKind::Anon) | PageState::Anon(_) => PageType::Anon,
            PageState::Uninit(UninitKind::File(_)) | PageState::File(_) => PageType::File,
        }
    }
}

/// What `frame::evict` must do for a page's backing, captured by shared
/// reference so the process-table lock can be released before the disk
/// write it names actually happens.
pub enum SwapOutPlan {
    None,
    Anon,
    File(FileState),
}

/// What `fault::claim` must do to materialize a page's bytes, captured by
/// shared reference for the same reason as `SwapOutPlan`.
pub enum SwapInPlan {
    ZeroFill,
    ReadSlot(SwapSlot),
    LoadFile(FileState),
}

pub struct Page {
    pub va: VirtAddr,
    pub writable: bool,
    pub frame: Option<FrameId>,
    pub state: PageState,
}

impl Page {
    pub fn new_uninit(va: VirtAddr, writable: bool, kind: UninitKind) -> Self {
        Self {
            va,
            writable,
            frame: None,
            state: PageState::Uninit(kind),
        }
    }

    pub fn page_type(&self) -> PageType {
        self.state.page_type()
    }

    /// mmap context this page keeps a reference into, if any — used by the
    /// frame table and SPT to decrement the shared refcount on teardown
    /// regardless of whether the page was ever faulted in.
    pub fn mmap_ctx(&self) -> Option<&Arc<Mutex<MmapContext>>> {
        match &self.state {
            PageState::Uninit(UninitKind::File(fs)) | PageState::File(fs) => fs.mmap_ctx.as_ref(),
            _ => None,
        }
    }

    /// Materializes this page's bytes into `kva` (PAGE_SIZE bytes starting
    /// there), transitioning an `Uninit` page to its typed state on first
    /// call.
    pub fn swap_in(&mut self, kva: *mut u8) -> Result<(), VmError> {
        let next_state = match &self.state {
            PageState::Uninit(UninitKind::Anon) => {
                crate::memory::anon::zero_fill(kva);
                Some(PageState::Anon(AnonState { slot: None }))
            }
            PageState::Uninit(UninitKind::File(fs)) => {
                crate::memory::file::load(fs, kva)?;
                Some(PageState::File(fs.clone()))
            }
            PageState::Anon(anon) => {
                crate::memory::anon::swap_in(anon, kva)?;
                Some(PageState::Anon(AnonState { slot: None }))
            }
            PageState::File(fs) => {
                crate::memory::file::load(fs, kva)?;
                None
            }
        };
        if let Some(s) = next_state {
            self.state = s;
        }
        Ok(())
    }

    /// Persists the bound frame's bytes (at `kva`) to this page's backing
    /// store. Called by the evictor before the frame/page link is broken.
    pub fn swap_out(&mut self, kva: *const u8) -> Result<(), VmError> {
        match &mut self.state {
            PageState::Anon(anon) => crate::memory::anon::swap_out(anon, kva),
            PageState::File(fs) => crate::memory::file::swap_out(fs, self.va, kva),
            PageState::Uninit(_) => Ok(()),
        }
    }

    /// Describes, without mutating anything, what `swap_in` would have to do
    /// for this page. The caller does the named I/O lock-free and then calls
    /// `commit_swap_in` to apply the resulting state transition.
    pub fn swap_in_plan(&self) -> SwapInPlan {
        match &self.state {
            PageState::Uninit(UninitKind::Anon) => SwapInPlan::ZeroFill,
            PageState::Uninit(UninitKind::File(fs)) => SwapInPlan::LoadFile(fs.clone()),
            PageState::Anon(anon) => match anon.slot {
                Some(slot) => SwapInPlan::ReadSlot(slot),
                None => SwapInPlan::ZeroFill,
            },
            PageState::File(fs) => SwapInPlan::LoadFile(fs.clone()),
        }
    }

    /// Applies the typed-state transition `swap_in_plan`'s I/O earns. Any
    /// slot the plan read has already been freed by the caller by this
    /// point, mirroring `swap_in`'s own slot handling.
    pub fn commit_swap_in(&mut self) {
        match &self.state {
            PageState::Uninit(UninitKind::Anon) | PageState::Anon(_) => {
                self.state = PageState::Anon(AnonState { slot: None });
            }
            PageState::Uninit(UninitKind::File(fs)) => {
                self.state = PageState::File(fs.clone());
            }
            PageState::File(_) => {}
        }
    }

    /// Describes what `frame::evict` must write out for this page, without
    /// needing a mutable borrow across the write itself.
    pub fn swap_out_plan(&self) -> SwapOutPlan {
        match &self.state {
            PageState::Anon(_) => SwapOutPlan::Anon,
            PageState::File(fs) => SwapOutPlan::File(fs.clone()),
            PageState::Uninit(_) => SwapOutPlan::None,
        }
    }

    /// Records the slot `anon::swap_out_detached` wrote to, once the
    /// process-table lock backing this page is held again.
    pub fn commit_anon_slot(&mut self, slot: SwapSlot) {
        if let PageState::Anon(anon) = &mut self.state {
            anon.slot = Some(slot);
        }
    }

    /// Backing-specific teardown: frees a held swap slot, or writes back a
    /// dirty mmap page and drops its share of the mmap context's refcount.
    /// Unmapping the MMU entry and releasing the frame itself is the SPT's
    /// job (`spt::Spt::remove`), not the backing's — both backings would
    /// otherwise duplicate that logic.
    pub fn destroy(&mut self, frame_kva: Option<*const u8>) {
        let va = self.va;
        match &self.state {
            PageState::Uninit(UninitKind::Anon) => {}
            PageState::Uninit(UninitKind::File(fs)) => crate::memory::file::destroy(fs, va, None),
            PageState::Anon(anon) => crate::memory::anon::destroy(anon),
            PageState::File(fs) => crate::memory::file::destroy(fs, va, frame_kva),
        }
    }
}
