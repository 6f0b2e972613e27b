//! # Page Directory (PD)
//!
//! - [`PdIndex`]: index type for VA bits `[31:22]`.
//! - [`PdEntry`]: a directory entry (PDE) pointing at a page table.
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 PDEs.
//!
//! A slot is either empty, points to a page table, or, for the self-map
//! slots, points back at the directory itself so the directory doubles as a
//! page table. Large (4 MiB) pages are never created.

use crate::{Frame, PageEntryBits};
use kernel_info::memory::NPDENTRIES;
use kernel_memory_addresses::VirtualAddress;

/// Index into the page directory (derived from VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdIndex(u16);

/// A single page directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdEntry(PageEntryBits);

/// The page directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; NPDENTRIES],
}

impl PdIndex {
    /// Build an index from a virtual address (extracts bits `[31:22]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self((va.as_u32() >> 22) as u16)
    }

    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < 1024);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// First virtual address covered by this slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new((self.0 as u32) << 22)
    }
}

impl PdEntry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// If present, the page table this entry points at.
    ///
    /// Debug-asserts that `PS=0`.
    #[inline]
    #[must_use]
    pub fn page_table(self) -> Option<Frame> {
        if !self.is_present() {
            return None;
        }
        debug_assert!(!self.0.large_page(), "4 MiB pages are not used");
        Some(Frame::containing(self.0.physical_address()))
    }

    /// Point this entry at the page table in `table`.
    ///
    /// Sets `present=1` and forces `PS=0`.
    #[inline]
    #[must_use]
    pub const fn make_table(table: Frame, mut flags: PageEntryBits) -> Self {
        flags.set_large_page(false);
        flags.set_present(true);
        flags.set_physical_address(table.base());
        Self(flags)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }
}

impl PageDirectory {
    /// Clear every slot in place.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PdEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: PdIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    /// Caller must handle any required TLB invalidation.
    #[inline]
    pub const fn set(&mut self, i: PdIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pde_points_at_table() {
        let page = Frame::new(0x117);
        let e = PdEntry::make_table(page, PageEntryBits::user_rw());
        assert_eq!(e.raw(), 0x0011_7007);
        assert_eq!(e.page_table(), Some(page));
        assert_eq!(PdEntry::zero().page_table(), None);
    }

    #[test]
    fn directory_is_one_page() {
        assert_eq!(size_of::<PageDirectory>(), 4096);
        assert_eq!(align_of::<PageDirectory>(), 4096);
    }

    #[test]
    fn index_base() {
        assert_eq!(PdIndex::new(0x3BF).base(), VirtualAddress::new(0xEFC0_0000));
        assert_eq!(PdIndex::from(VirtualAddress::new(0xF000_0000)).as_usize(), 0x3C0);
    }
}
