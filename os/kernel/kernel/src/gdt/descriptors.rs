//! # 32-bit segment descriptor encodings
//!
//! A protected-mode descriptor packs base, limit and attributes into eight
//! bytes:
//!
//! ```text
//!  63    56 55 54 53 52 51  48 47 46 45 44 43  40 39     32
//! +--------+--+--+--+--+------+--+-----+--+------+---------+
//! |base hi | G|DB| 0|AV|lim hi| P| DPL | S| type | base mid|
//! +--------+--+--+--+--+------+--+-----+--+------+---------+
//!  31                     16 15                          0
//! +-------------------------+----------------------------+
//! |        base lo          |          limit lo          |
//! +-------------------------+----------------------------+
//! ```
//!
//! [`SegmentDescriptor::segment`] builds page-granular 32-bit code/data
//! segments; [`SegmentDescriptor::segment16`] builds byte-granular ones and
//! is the starting point for the TSS descriptor.

use bitfield_struct::bitfield;

/// Executable segment.
pub const STA_X: u8 = 0x8;
/// Writeable (data segments).
pub const STA_W: u8 = 0x2;
/// Readable (code segments).
pub const STA_R: u8 = 0x2;

/// Available 32-bit TSS (system segment type).
pub const STS_T32A: u8 = 0x9;

#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Limit bits 0..15.
    pub lim_15_0: u16,
    /// Base bits 0..15.
    pub base_15_0: u16,
    /// Base bits 16..23.
    pub base_23_16: u8,
    /// Segment type (`STA_*` or `STS_*`).
    #[bits(4)]
    pub typ: u8,
    /// 1 for code/data, 0 for system segments.
    pub s: bool,
    /// Descriptor privilege level.
    #[bits(2)]
    pub dpl: u8,
    /// Present.
    pub p: bool,
    /// Limit bits 16..19.
    #[bits(4)]
    pub lim_19_16: u8,
    /// Available for software use.
    pub avl: bool,
    #[bits(1, default = false)]
    _rsv1: bool,
    /// 0 = 16-bit segment, 1 = 32-bit segment.
    pub db: bool,
    /// Granularity: limit scaled by 4 KiB when set.
    pub g: bool,
    /// Base bits 24..31.
    pub base_31_24: u8,
}

impl SegmentDescriptor {
    /// The mandatory all-zero entry.
    pub const NULL: Self = Self::new();

    /// Page-granular 32-bit segment covering `[base, base + lim]`.
    ///
    /// `lim` is a byte limit; its low 12 bits are dropped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn segment(typ: u8, base: u32, lim: u32, dpl: u8) -> Self {
        Self::new()
            .with_lim_15_0(((lim >> 12) & 0xFFFF) as u16)
            .with_base_15_0((base & 0xFFFF) as u16)
            .with_base_23_16(((base >> 16) & 0xFF) as u8)
            .with_typ(typ)
            .with_s(true)
            .with_dpl(dpl)
            .with_p(true)
            .with_lim_19_16((lim >> 28) as u8)
            .with_db(true)
            .with_g(true)
            .with_base_31_24((base >> 24) as u8)
    }

    /// Byte-granular segment with a limit below 1 MiB.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn segment16(typ: u8, base: u32, lim: u32, dpl: u8) -> Self {
        Self::new()
            .with_lim_15_0((lim & 0xFFFF) as u16)
            .with_base_15_0((base & 0xFFFF) as u16)
            .with_base_23_16(((base >> 16) & 0xFF) as u8)
            .with_typ(typ)
            .with_s(true)
            .with_dpl(dpl)
            .with_p(true)
            .with_lim_19_16(((lim >> 16) & 0xF) as u8)
            .with_db(true)
            .with_g(false)
            .with_base_31_24((base >> 24) as u8)
    }

    /// Available 32-bit TSS descriptor for a TSS of `size` bytes at `base`.
    #[must_use]
    pub const fn tss(base: u32, size: u32) -> Self {
        Self::segment16(STS_T32A, base, size - 1, 0).with_s(false)
    }

    /// Linear base address encoded in the descriptor.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn base(self) -> u32 {
        ((self.base_31_24() as u32) << 24) | ((self.base_23_16() as u32) << 16) | self.base_15_0() as u32
    }
}
