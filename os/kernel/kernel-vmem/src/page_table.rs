//! # Two-Level Page Tables
//!
//! A linear address splits into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PDX  |  PTX  | Offset |
//! ```
//!
//! `PDX` selects an entry in the [`PageDirectory`](pd::PageDirectory), which
//! points to a [`PageTable`](pt::PageTable); `PTX` selects the entry mapping
//! the 4 KiB frame; the offset is carried through unchanged.

pub mod pd;
pub mod pt;

use crate::page_table::pd::PdIndex;
use crate::page_table::pt::PtIndex;
use kernel_memory_addresses::VirtualAddress;

/// Decompose `va` into directory index, table index and page offset.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (PdIndex, PtIndex, u32) {
    (PdIndex::from(va), PtIndex::from(va), va.page_offset())
}

/// Inverse of [`split_indices`].
#[inline]
#[must_use]
pub const fn join_indices(pdx: PdIndex, ptx: PtIndex, offset: u32) -> VirtualAddress {
    #[allow(clippy::cast_possible_truncation)]
    let (d, t) = (pdx.as_usize() as u32, ptx.as_usize() as u32);
    VirtualAddress::new((d << 22) | (t << 12) | offset)
}
