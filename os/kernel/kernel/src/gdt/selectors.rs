//! # Segment selectors
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+  (TI=0 → GDT, TI=1 → LDT; RPL=0..3)
//! ```

use bitfield_struct::bitfield;

/// Raw 16-bit selector encoding.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct SegmentSelector {
    /// Requested privilege level.
    #[bits(2)]
    pub rpl: u8,
    /// Table indicator: set for the LDT.
    pub ti: bool,
    /// Descriptor index.
    #[bits(13)]
    pub index: u16,
}

impl SegmentSelector {
    /// Selector for GDT entry `index` with requested privilege `rpl`.
    #[must_use]
    pub const fn gdt(index: u16, rpl: u8) -> Self {
        Self::new().with_index(index).with_rpl(rpl).with_ti(false)
    }

    /// The same selector with a different requested privilege level.
    #[must_use]
    pub const fn with_privilege(self, rpl: u8) -> Self {
        self.with_rpl(rpl)
    }

    /// The value loaded into a segment register.
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.into_bits()
    }
}
