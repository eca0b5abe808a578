//! Page fault classification and resolution (SPEC_FULL.md §4.6).

use x86_64::structures::idt::InterruptStackFrame;
use x86_64::VirtAddr;

use crate::memory::page::{PageType, SwapInPlan};
use crate::memory::{anon, file, frame, mmu, swap};
use crate::memory::{is_user_address, page_round_down, VmError, STACK_MAX, USER_STACK_TOP};
use crate::process;

/// Stack-growth slack below `rsp`, accommodating a `push`/`call` that faults
/// before its target word is written.
const STACK_SLACK: u64 = 32;

pub fn try_handle_fault(
    stack_frame: &InterruptStackFrame,
    addr: VirtAddr,
    user: bool,
    _write: bool,
    not_present: bool,
) -> bool {
    try_handle_fault_inner(stack_frame, addr, user, _write, not_present).unwrap_or(false)
}

fn try_handle_fault_inner(
    stack_frame: &InterruptStackFrame,
    addr: VirtAddr,
    user: bool,
    write: bool,
    not_present: bool,
) -> Option<bool> {
    if !not_present || !is_user_address(addr) {
        return Some(false);
    }

    let pid = process::current_pid()?;
    let page_va = page_round_down(addr);

    let existing = process::with_process(pid, |proc| {
        proc.spt.find(page_va).map(|p| p.writable)
    })?;

    if let Some(writable) = existing {
        if write && !writable {
            return Some(false);
        }
        return Some(claim(page_va));
    }

    let rsp = if user {
        stack_frame.stack_pointer
    } else {
        let saved = process::with_process(pid, |p| p.user_rsp)?;
        if saved.as_u64() == 0 || !is_user_address(saved) {
            return Some(false);
        }
        saved
    };

    if page_va.as_u64() >= USER_STACK_TOP {
        return Some(false);
    }
    if USER_STACK_TOP - page_va.as_u64() > STACK_MAX {
        return Some(false);
    }
    if addr.as_u64() + STACK_SLACK < rsp.as_u64() {
        return Some(false);
    }

    let installed = process::with_process_mut(pid, |proc| {
        proc.spt.alloc_with_initializer(PageType::Anon, page_va, true)
    })?;
    if installed.is_err() {
        return Some(false);
    }

    Some(claim(page_va))
}

/// Brings `va` into a frame in the current process's address space: obtains
/// a frame, loads the page's bytes into it, and installs the MMU mapping.
/// The frame is pinned for the duration so a concurrent eviction scan can't
/// pick it mid-load.
pub fn claim(va: VirtAddr) -> bool {
    claim_inner(va).unwrap_or(false)
}

fn claim_inner(va: VirtAddr) -> Option<bool> {
    let pid = process::current_pid()?;
    let va = page_round_down(va);

    let fid = frame::get_frame().ok()?;
    let kva = frame::kva_of(fid)?;
    frame::bind(fid, pid, va);

    // Every process-table lock below is held only long enough to clone a
    // plan or commit its result, never across the disk I/O the plan names
    // (SPEC_FULL §5) — `with_process`/`with_process_mut` each take and
    // release the lock on their own, so nothing here nests a second lock
    // attempt underneath an outer one.
    let plan = match process::with_process(pid, |proc| proc.spt.find(va).map(|p| p.swap_in_plan())) {
        Some(Some(plan)) => plan,
        _ => {
            let _ = frame::release(fid);
            return Some(false);
        }
    };

    let io_result: Result<(), VmError> = match &plan {
        SwapInPlan::ZeroFill => {
            anon::zero_fill(kva.as_mut_ptr::<u8>());
            Ok(())
        }
        SwapInPlan::ReadSlot(slot) => swap::read(*slot, kva.as_mut_ptr::<u8>()),
        SwapInPlan::LoadFile(fs) => file::load(fs, kva.as_mut_ptr::<u8>()),
    };
    if io_result.is_err() {
        let _ = frame::release(fid);
        return Some(false);
    }
    if let SwapInPlan::ReadSlot(slot) = plan {
        swap::free(slot);
    }

    let outcome = process::with_process_mut(pid, |proc| -> Option<bool> {
        let page = proc.spt.find_mut(va)?;
        page.commit_swap_in();
        page.frame = Some(fid);
        Some(page.writable)
    })
    .flatten();

    let writable = match outcome {
        Some(w) => w,
        None => {
            let _ = frame::release(fid);
            return Some(false);
        }
    };

    let phys = match frame::phys_of(fid) {
        Some(p) => p.start_address(),
        None => {
            let _ = frame::release(fid);
            return Some(false);
        }
    };

    if mmu::mmu_map(mmu::current(), va, phys, writable).is_err() {
        process::with_process_mut(pid, |proc| {
            if let Some(page) = proc.spt.find_mut(va) {
                page.frame = None;
            }
        });
        let _ = frame::release(fid);
        return Some(false);
    }

    frame::unpin(fid);
    Some(true)
}
