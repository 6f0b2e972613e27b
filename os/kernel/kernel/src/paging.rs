//! Switching the CPU onto a page directory.

use kernel_registers::cr0::Cr0;
use kernel_registers::cr3::Cr3;
use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use kernel_vmem::Frame;

/// Load `directory` into CR3 and turn paging on.
///
/// CR0 gains `PE|PG|AM|WP|NE|MP` and loses `TS|EM`.
///
/// # Safety
/// - Must run at CPL0 with interrupts disabled.
/// - The code, stack and data in use must be mapped at their current linear
///   addresses by `directory` (the boot directory's low alias does this for
///   the segment-translated entry code).
pub unsafe fn enable_paging(directory: Frame) {
    unsafe {
        Cr3::from_directory_phys(directory.base(), false, false).store_unsafe();
        let cr0 = Cr0::load_unsafe().with_paging_enabled();
        cr0.store_unsafe();
    }
}

/// Reload CR3 with its current value, flushing all non-global TLB entries.
///
/// # Safety
/// Must run at CPL0 with paging enabled.
pub unsafe fn flush_tlb() {
    unsafe {
        let cr3 = Cr3::load_unsafe();
        cr3.store_unsafe();
    }
}
