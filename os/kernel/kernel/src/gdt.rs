//! # Global Descriptor Table and Task State Segment wiring
//!
//! Paging does all the memory protection; segmentation is reduced to flat
//! 4 GiB segments that only carry privilege levels.
//!
//! ## GDT layout
//! Index | Selector | Meaning
//! ------|----------|--------
//! 0     | 0x00     | Null
//! 1     | 0x08     | Kernel code (DPL=0; [`GD_KT`])
//! 2     | 0x10     | Kernel data (DPL=0; [`GD_KD`])
//! 3     | 0x18     | User code (DPL=3; [`GD_UT`], loaded as 0x1b)
//! 4     | 0x20     | User data (DPL=3; [`GD_UD`], loaded as 0x23)
//! 5     | 0x28     | 32-bit available TSS ([`GD_TSS`])
//!
//! [`load`] installs the table with `lgdt`, reloads every segment register
//! (`gs`/`fs` with the user data selector, `es`/`ds`/`ss` with kernel data,
//! `cs` through a far return), clears the LDT and loads the task register.

pub mod descriptors;
pub mod selectors;

use crate::gdt::descriptors::{STA_R, STA_W, STA_X, SegmentDescriptor};
use crate::gdt::selectors::SegmentSelector;
use crate::tss::{TSS_SIZE, TaskState};
use core::mem::size_of;

/// Kernel text.
pub const GD_KT: SegmentSelector = SegmentSelector::gdt(1, 0);
/// Kernel data.
pub const GD_KD: SegmentSelector = SegmentSelector::gdt(2, 0);
/// User text.
pub const GD_UT: SegmentSelector = SegmentSelector::gdt(3, 0);
/// User data.
pub const GD_UD: SegmentSelector = SegmentSelector::gdt(4, 0);
/// Task state segment.
pub const GD_TSS: SegmentSelector = SegmentSelector::gdt(5, 0);

/// Segment limit of the flat segments.
const FLAT_LIMIT: u32 = 0xFFFF_FFFF;

#[allow(clippy::items_after_statements)]
const _: () = {
    const fn enc(index: u16, rpl: u16) -> u16 {
        (index << 3) | rpl
    }

    assert!(GD_KT.encode() == 0x08 && GD_KT.encode() == enc(1, 0));
    assert!(GD_KD.encode() == 0x10 && GD_KD.encode() == enc(2, 0));
    assert!(GD_UT.encode() == 0x18 && GD_UT.encode() == enc(3, 0));
    assert!(GD_UD.encode() == 0x20 && GD_UD.encode() == enc(4, 0));
    assert!(GD_TSS.encode() == 0x28 && GD_TSS.encode() == enc(5, 0));
    assert!(size_of::<Gdt>() == 6 * 8);
};

/// Operand of `lgdt`.
#[repr(C, packed)]
pub struct DescTablePtr {
    /// Size of the table minus one.
    pub limit: u16,
    /// Linear address of the table.
    pub base: u32,
}

/// The kernel's GDT.
#[repr(C, align(8))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Gdt {
    pub null: SegmentDescriptor,
    pub kernel_code: SegmentDescriptor,
    pub kernel_data: SegmentDescriptor,
    pub user_code: SegmentDescriptor,
    pub user_data: SegmentDescriptor,
    pub tss: SegmentDescriptor,
}

impl Gdt {
    /// Flat kernel and user segments plus the TSS at linear address `tss_base`.
    #[must_use]
    pub const fn new(tss_base: u32) -> Self {
        Self {
            null: SegmentDescriptor::NULL,
            kernel_code: SegmentDescriptor::segment(STA_X | STA_R, 0, FLAT_LIMIT, 0),
            kernel_data: SegmentDescriptor::segment(STA_W, 0, FLAT_LIMIT, 0),
            user_code: SegmentDescriptor::segment(STA_X | STA_R, 0, FLAT_LIMIT, 3),
            user_data: SegmentDescriptor::segment(STA_W, 0, FLAT_LIMIT, 3),
            tss: SegmentDescriptor::tss(tss_base, TSS_SIZE),
        }
    }

    /// `lgdt` operand describing `self` at linear address `base`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn pointer(base: u32) -> DescTablePtr {
        DescTablePtr {
            limit: (size_of::<Self>() - 1) as u16,
            base,
        }
    }
}

/// The TSS of the boot CPU: ring-0 entries land on the boot kernel stack.
#[must_use]
pub const fn boot_task_state() -> TaskState {
    TaskState::new(kernel_info::memory::KSTACKTOP, GD_KD.encode())
}

/// Install `gdt`, reload all segment registers, clear the LDT and load the
/// task register with [`GD_TSS`].
///
/// # Safety
/// - Must run at CPL0 with interrupts disabled.
/// - `gdt` must stay mapped and writable for as long as it is loaded; the
///   CPU marks the TSS descriptor busy in place.
/// - The TSS described by `gdt.tss` must stay alive for the same period.
#[cfg(target_arch = "x86")]
pub unsafe fn load(gdt: &'static Gdt) {
    let ptr = Gdt::pointer(core::ptr::from_ref(gdt) as u32);
    let user_data = GD_UD.with_privilege(3).encode();
    let kernel_data = GD_KD.encode();

    unsafe {
        core::arch::asm!(
            "lgdt [{ptr}]",
            "mov gs, {ud:x}",
            "mov fs, {ud:x}",
            "mov es, {kd:x}",
            "mov ds, {kd:x}",
            "mov ss, {kd:x}",
            "push {kt}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            ptr = in(reg) &raw const ptr,
            ud = in(reg) u32::from(user_data),
            kd = in(reg) u32::from(kernel_data),
            kt = const GD_KT.encode(),
            tmp = out(reg) _,
            options(preserves_flags)
        );
        core::arch::asm!("lldt {0:x}", in(reg) 0u32, options(nostack, preserves_flags));
        core::arch::asm!("ltr {0:x}", in(reg) u32::from(GD_TSS.encode()), options(nostack, preserves_flags));
    }
    log::debug!("GDT loaded at {:#010x}", core::ptr::from_ref(gdt) as u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdt::descriptors::STS_T32A;

    #[test]
    fn table_entries() {
        let gdt = Gdt::new(0xF011_8000);
        assert_eq!(gdt.null.into_bits(), 0);
        assert_eq!(gdt.kernel_code.into_bits(), 0x00CF_9A00_0000_FFFF);
        assert_eq!(gdt.kernel_data.into_bits(), 0x00CF_9200_0000_FFFF);
        assert_eq!(gdt.user_code.into_bits(), 0x00CF_FA00_0000_FFFF);
        assert_eq!(gdt.user_data.into_bits(), 0x00CF_F200_0000_FFFF);
        assert_eq!(gdt.tss.typ(), STS_T32A);
        assert_eq!(gdt.tss.base(), 0xF011_8000);
        assert_eq!(u32::from(gdt.tss.lim_15_0()), TSS_SIZE - 1);
    }

    #[test]
    fn lgdt_operand() {
        let ptr = Gdt::pointer(0xF010_2000);
        let limit = ptr.limit;
        let base = ptr.base;
        assert_eq!(limit, 47);
        assert_eq!(base, 0xF010_2000);
    }

    #[test]
    fn boot_tss_uses_the_kernel_stack() {
        let tss = boot_task_state();
        assert_eq!(tss.esp0, kernel_info::memory::KSTACKTOP);
        assert_eq!(tss.ss0, 0x10);
    }

    #[test]
    fn user_selectors_carry_rpl_3() {
        assert_eq!(GD_UT.with_privilege(3).encode(), 0x1B);
        assert_eq!(GD_UD.with_privilege(3).encode(), 0x23);
    }
}
