use kernel_memory_addresses::VirtualAddress;

/// Translation-cache maintenance for a single address.
pub trait Tlb {
    /// Drop any cached translation for `va`.
    fn invalidate_page(&self, va: VirtualAddress);
}

/// Invalidate through the `invlpg` instruction.
///
/// Only meaningful while the address space being edited is the active one;
/// for others the instruction is harmless.
#[derive(Copy, Clone, Debug, Default)]
pub struct Invlpg;

#[cfg(target_arch = "x86")]
impl Tlb for Invlpg {
    #[inline]
    fn invalidate_page(&self, va: VirtualAddress) {
        // SAFETY: invlpg only touches the TLB.
        unsafe {
            core::arch::asm!("invlpg [{}]", in(reg) va.as_u32(), options(nostack, preserves_flags));
        }
    }
}
