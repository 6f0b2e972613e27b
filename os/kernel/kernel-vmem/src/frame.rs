use core::fmt;
use kernel_memory_addresses::PhysicalAddress;

/// A physical 4 KiB frame, identified by its frame number (`pa >> 12`).
///
/// The frame number doubles as the index into the frame table, so a `Frame`
/// is all an allocator needs to find the frame's bookkeeping.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Frame(u32);

impl Frame {
    #[inline]
    #[must_use]
    pub const fn new(number: u32) -> Self {
        debug_assert!(number < (1 << 20), "frame number out of range");
        Self(number)
    }

    /// The frame that contains `pa`.
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.as_u32() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// First byte of the frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << 12)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(#{} @ {:#010X})", self.0, self.0 << 12)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
