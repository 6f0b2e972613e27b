use crate::PAGE_SIZE;
use core::fmt;
use core::ops::Add;

/// Physical memory address: RAM, the I/O hole, or device memory.
///
/// Kept apart from [`VirtualAddress`](super::VirtualAddress) so the two
/// cannot be mixed up; crossing over is the physical mapper's job.
///
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// let pa = PhysicalAddress::new(0x0012_3042);
/// assert_eq!(pa.page_offset(), 0x42);
/// assert!((pa + 0xFBE).is_page_aligned());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u32 {
        self.0 & (PAGE_SIZE - 1)
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:08X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Wrapping is a bug in the caller; debug builds panic on overflow.
impl Add<u32> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u32) -> Self {
        Self(self.0 + rhs)
    }
}
