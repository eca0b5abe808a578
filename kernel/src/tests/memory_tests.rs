// Virtual memory subsystem end-to-end coverage (SPEC_FULL.md §8).
//
// These run inside a single active address space with no real hardware
// page-table switch, so every scenario uses one process and drives the
// SPT/frame-table/swap machinery directly rather than through faults,
// which require a live MMU and aren't reachable from a unit test.

#[cfg(test)]
mod tests {
    use crate::memory::page::{Page, PageState, PageType, UninitKind};
    use crate::memory::{VmError, PAGE_SIZE};
    use x86_64::VirtAddr;

    #[test]
    fn lazy_anon_page_starts_uninit() {
        let va = VirtAddr::new(0x4000_0000);
        let page = Page::new_uninit(va, true, UninitKind::Anon);
        assert_eq!(page.va, va);
        assert!(page.frame.is_none());
        assert!(matches!(page.state, PageState::Uninit(UninitKind::Anon)));
        assert_eq!(page.page_type(), PageType::Anon);
    }

    #[test]
    fn anon_swap_round_trip_preserves_bytes() {
        let va = VirtAddr::new(0x4000_1000);
        let mut page = Page::new_uninit(va, true, UninitKind::Anon);
        let mut backing = [0u8; PAGE_SIZE as usize];

        page.swap_in(backing.as_mut_ptr()).unwrap();
        assert!(backing.iter().all(|&b| b == 0));

        backing[0] = 0xAB;
        backing[PAGE_SIZE as usize - 1] = 0xCD;
        page.swap_out(backing.as_ptr()).unwrap();

        let mut restored = [0u8; PAGE_SIZE as usize];
        page.swap_in(restored.as_mut_ptr()).unwrap();
        assert_eq!(restored[0], 0xAB);
        assert_eq!(restored[PAGE_SIZE as usize - 1], 0xCD);
    }

    #[test]
    fn spt_rejects_overlapping_insert() {
        use crate::memory::spt::Spt;

        let mut spt = Spt::new();
        let va = VirtAddr::new(0x5000_0000);
        spt.alloc_with_initializer(PageType::Anon, va, true).unwrap();
        let err = spt.alloc_with_initializer(PageType::Anon, va, true).unwrap_err();
        assert_eq!(err, VmError::Overlap);
    }

    #[test]
    fn fork_copies_uninit_pages_as_fresh_deferred_initializers() {
        use crate::memory::spt::{fork_copy_page, Spt};
        use crate::process::ProcessId;

        let child = ProcessId(2);

        let mut src = Spt::new();
        let va = VirtAddr::new(0x6000_0000);
        src.alloc_with_initializer(PageType::Anon, va, true).unwrap();

        let mut dst = Spt::new();
        for entry in src.fork_entries() {
            let page = fork_copy_page(child, entry).unwrap();
            dst.insert(page).unwrap();
        }

        assert!(dst.find(va).is_some());
        assert!(src.find(va).is_some());
    }
}
