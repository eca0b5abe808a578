//! Anonymous page backing: zero-fill on first use, swap-slot round trip
//! after that. Grounded in `examples/original_source/pintos/vm/anon.c`.

use crate::memory::page::AnonState;
use crate::memory::swap::{self, SwapSlot};
use crate::memory::{VmError, PAGE_SIZE};

pub fn zero_fill(kva: *mut u8) {
    unsafe {
        core::ptr::write_bytes(kva, 0, PAGE_SIZE as usize);
    }
}

pub fn swap_in(anon: &AnonState, kva: *mut u8) -> Result<(), VmError> {
    match anon.slot {
        None => {
            zero_fill(kva);
            Ok(())
        }
        Some(slot) => {
            swap::read(slot, kva)?;
            swap::free(slot);
            Ok(())
        }
    }
}

/// Writes the frame's current bytes to a freshly allocated slot. The caller
/// (the evictor) is responsible for recording the returned slot on the page
/// before the frame is unbound.
pub fn swap_out(anon: &mut AnonState, kva: *const u8) -> Result<(), VmError> {
    anon.slot = Some(swap_out_detached(kva)?);
    Ok(())
}

/// Same write as `swap_out`, without requiring a mutable `AnonState`. Used
/// by the evictor, which reads the page's backing kind under a brief
/// process-table lock, does this write with the lock released, and commits
/// the returned slot back under a second brief lock.
pub fn swap_out_detached(kva: *const u8) -> Result<SwapSlot, VmError> {
    let slot = swap::allocate()?;
    if let Err(e) = swap::write(slot, kva) {
        swap::free(slot);
        return Err(e);
    }
    Ok(slot)
}

pub fn destroy(anon: &AnonState) {
    if let Some(slot) = anon.slot {
        swap::free(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_anon_page_zero_fills() {
        let mut buf = [0xAAu8; PAGE_SIZE as usize];
        let anon = AnonState { slot: None };
        swap_in(&anon, buf.as_mut_ptr()).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }
}
