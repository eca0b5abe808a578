// Cross-module virtual memory scenarios (SPEC_FULL.md §8).

#[cfg(test)]
mod tests {
    use crate::memory::page::{Page, PageType, UninitKind};
    use crate::memory::spt::Spt;
    use crate::memory::PAGE_SIZE;
    use x86_64::VirtAddr;

    /// A page that's never been loaded still reports its static `PageType`
    /// before and after a swap-out of dirty zero bytes (a no-op here since
    /// the frame/MMU layer isn't live in a unit test, but the SPT bookkeeping
    /// around it is exercised the same way a faulted-in page would be).
    #[test]
    fn uninit_anon_page_type_is_stable_across_spt_operations() {
        let mut spt = Spt::new();
        let va = VirtAddr::new(0x7000_0000);
        spt.alloc_with_initializer(PageType::Anon, va, true).unwrap();

        let page = spt.find(va).unwrap();
        assert_eq!(page.page_type(), PageType::Anon);

        spt.remove(va);
        assert!(spt.find(va).is_none());
    }

    #[test]
    fn multiple_anon_pages_occupy_distinct_slots() {
        let mut spt = Spt::new();
        let base = VirtAddr::new(0x7100_0000);
        for i in 0..4u64 {
            spt
                .alloc_with_initializer(PageType::Anon, base + i * PAGE_SIZE, true)
                .unwrap();
        }
        for i in 0..4u64 {
            assert!(spt.find(base + i * PAGE_SIZE).is_some());
        }
        spt.kill();
        for i in 0..4u64 {
            assert!(spt.find(base + i * PAGE_SIZE).is_none());
        }
    }

    #[test]
    fn new_uninit_page_defers_backing_choice_until_swap_in() {
        use crate::memory::page::{FileState, PageState};
        use crate::fs::file;

        let handle = file::file_open("/does-not-need-to-exist-for-this-check");
        let fs = FileState {
            file: handle,
            offset: 0,
            read_bytes: 0,
            zero_bytes: PAGE_SIZE as u32,
            is_mmap: true,
            mmap_ctx: None,
        };
        let page = Page::new_uninit(VirtAddr::new(0x7200_0000), false, UninitKind::File(fs));
        assert!(matches!(page.state, PageState::Uninit(UninitKind::File(_))));
        assert_eq!(page.page_type(), PageType::File);
    }
}
