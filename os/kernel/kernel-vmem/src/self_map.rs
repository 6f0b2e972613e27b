//! # Recursive (self) mapping
//!
//! With directory slot `PDX(base)` pointing back at the directory, the
//! 4 MiB window starting at `base` exposes the address space's own paging
//! structures:
//!
//! ```text
//! base + PDX(va) * 4096       page table covering va
//! base + (va >> 12) * 4       PTE for va
//! base + PDX(base) * 4096     the directory itself
//! ```

use kernel_info::memory::{PGSIZE, PTSIZE};
use kernel_memory_addresses::VirtualAddress;

/// Address arithmetic for a self-mapped window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SelfMap {
    base: VirtualAddress,
}

impl SelfMap {
    /// `base` must be 4 MiB aligned.
    #[inline]
    #[must_use]
    pub const fn new(base: VirtualAddress) -> Self {
        debug_assert!(base.as_u32() % PTSIZE == 0, "self-map window must be 4 MiB aligned");
        Self { base }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        self.base
    }

    /// Virtual address at which the PTE for `va` is visible.
    #[inline]
    #[must_use]
    pub const fn pte_address(self, va: VirtualAddress) -> VirtualAddress {
        VirtualAddress::new(self.base.as_u32() + (va.as_u32() >> 12) * 4)
    }

    /// Virtual address of the page table covering `va`.
    #[inline]
    #[must_use]
    pub const fn table_address(self, va: VirtualAddress) -> VirtualAddress {
        VirtualAddress::new(self.base.as_u32() + (va.as_u32() / PTSIZE) * PGSIZE)
    }

    /// Virtual address at which the directory is visible.
    #[inline]
    #[must_use]
    pub const fn directory_address(self) -> VirtualAddress {
        self.table_address(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::{UVPT, VPT};

    #[test]
    fn vpt_window() {
        let vpt = SelfMap::new(VirtualAddress::new(VPT));
        assert_eq!(vpt.directory_address(), VirtualAddress::new(0xEFFB_F000));
        assert_eq!(
            vpt.pte_address(VirtualAddress::new(0xF010_0000)),
            VirtualAddress::new(0xEFFC_0400)
        );
        assert_eq!(
            vpt.pte_address(vpt.table_address(VirtualAddress::new(0xF010_0000))),
            VirtualAddress::new(0xEFFB_FF00)
        );
    }

    #[test]
    fn uvpt_window() {
        let uvpt = SelfMap::new(VirtualAddress::new(UVPT));
        assert_eq!(uvpt.directory_address(), VirtualAddress::new(0xEF7B_D000));
        assert_eq!(uvpt.table_address(VirtualAddress::new(0)), VirtualAddress::new(UVPT));
    }
}
