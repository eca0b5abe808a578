#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![feature(abi_x86_interrupt)]
#![test_runner(crate::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

use alloc::vec::Vec;
use bootloader::bootinfo::MemoryRegionType;
use bootloader::{entry_point, BootInfo};
use x86_64::{PhysAddr, VirtAddr};

mod serial;
mod interrupts;
mod gdt;
mod memory;
mod allocator;
mod process;
mod drivers;
mod fs;

#[cfg(test)]
mod tests;

extern crate alloc;

entry_point!(kernel_main);

fn kernel_main(boot_info: &'static BootInfo) -> ! {
    serial_println!("vm kernel: booting");

    gdt::init();
    interrupts::init_idt();
    unsafe { interrupts::PICS.lock().initialize() };

    allocator::init_heap();
    serial_println!("vm kernel: heap ready");

    let usable: Vec<memory::frame_allocator::MemoryRegion> = boot_info
        .memory_map
        .iter()
        .filter(|r| r.region_type == MemoryRegionType::Usable)
        .map(|r| memory::frame_allocator::MemoryRegion {
            start: PhysAddr::new(r.range.start_addr()),
            end: PhysAddr::new(r.range.end_addr()),
        })
        .collect();
    memory::frame_allocator::init_frame_allocator(&usable);
    serial_println!("vm kernel: frame allocator ready");

    // `mmu::mmu_map`'s intermediate page-table frames are drawn from this
    // same bitmap allocator (see `memory::mmu::BitmapAllocatorAdapter`), so
    // there is only ever one allocator over physical memory — two
    // independently-indexing allocators over the same usable range used to
    // hand out the same physical frame twice.
    let physical_memory_offset = VirtAddr::new(boot_info.physical_memory_offset);
    memory::paging::init_global_mapper(physical_memory_offset);
    serial_println!("vm kernel: paging ready");

    drivers::disk::DISK_MANAGER.lock().init();
    serial_println!("vm kernel: disks ready");

    serial::init();
    memory::vm_init();
    process::init();

    x86_64::instructions::interrupts::enable();
    serial_println!("vm kernel: up");

    #[cfg(test)]
    test_main();

    hlt_loop();
}

pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    serial_println!("\n=== KERNEL PANIC ===");
    serial_println!("{}", info);
    hlt_loop();
}

#[cfg(test)]
fn test_runner(tests: &[&dyn Fn()]) {
    serial_println!("Running {} tests", tests.len());
    for test in tests {
        test();
    }
}
