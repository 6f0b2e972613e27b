//! # Page Table (PT)
//!
//! - [`PtIndex`]: index type for VA bits `[21:12]`.
//! - [`PtEntry`]: a page table entry (PTE); every present entry maps one
//!   4 KiB frame.
//! - [`PageTable`]: a 4 KiB-aligned array of 1024 PTEs.
//!
//! After modifying active mappings, the caller must invalidate the TLB.

use crate::{Frame, PageEntryBits};
use kernel_info::memory::NPTENTRIES;
use kernel_memory_addresses::VirtualAddress;

/// Index into a page table (derived from VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PtIndex(u16);

/// A single page table entry (PTE).
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

/// A page table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; NPTENTRIES],
}

impl PtIndex {
    /// Build an index from a virtual address (extracts bits `[21:12]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(((va.as_u32() >> 12) & 0x3FF) as u16)
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
}

impl PtEntry {
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

    /// If present, the mapped frame.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<Frame> {
        if !self.is_present() {
            return None;
        }
        Some(Frame::containing(self.0.physical_address()))
    }

    /// Create a 4 KiB leaf entry.
    ///
    /// Sets `present=1`, forces `PS=0` and writes the frame base; any frame
    /// bits in `flags` are overwritten.
    #[inline]
    #[must_use]
    pub const fn make_4k(frame: Frame, mut flags: PageEntryBits) -> Self {
        flags.set_large_page(false);
        flags.set_present(true);
        flags.set_physical_address(frame.base());
        Self(flags)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }
}

impl PageTable {
    /// Clear every entry in place.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PtEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: PtIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    /// Caller must handle any required TLB invalidation.
    #[inline]
    pub const fn set(&mut self, i: PtIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    #[inline]
    pub const fn entry_mut(&mut self, i: PtIndex) -> &mut PtEntry {
        &mut self.entries[i.as_usize()]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn pte_4k_leaf() {
        let frame = Frame::containing(PhysicalAddress::new(0x0555_5000));
        let e = PtEntry::make_4k(frame, PageEntryBits::user_ro());
        assert_eq!(e.frame(), Some(Frame::new(0x5555)));
        assert_eq!(e.frame().unwrap().base().as_u32(), 0x0555_5000);
        let fl = e.flags();
        assert!(!fl.large_page());
        assert!(fl.user_access());
        assert!(!fl.writable());
    }

    #[test]
    fn stray_frame_bits_in_flags_are_replaced() {
        let dirty = PageEntryBits::from_bits(0xABCD_E002);
        let e = PtEntry::make_4k(Frame::new(7), dirty);
        assert_eq!(e.raw(), 0x0000_7003);
    }
}
