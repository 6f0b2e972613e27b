use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// CR3: Page Directory Base Register (IA-32, non-PAE).
///
/// Holds the physical base address of the page directory and cache-control
/// flags for directory accesses.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Cr3 {
    /// Bits 0–2: Reserved (must be 0).
    #[bits(3, default = 0)]
    _reserved0: u8,

    /// Bit 3: PWT: Page-level Write-Through for the page directory.
    pub pwt: bool,

    /// Bit 4: PCD: Page-level Cache Disable for the page directory.
    pub pcd: bool,

    /// Bits 5–11: Reserved (must be 0 when written).
    #[bits(7, default = 0)]
    _reserved1: u8,

    /// Bits 12–31: page directory physical base >> 12.
    #[bits(20)]
    directory_base_4k: u32,
}

impl Cr3 {
    /// Create a `Cr3` value from a page directory physical base address.
    ///
    /// `directory` must be 4 KiB-aligned.
    #[must_use]
    pub const fn from_directory_phys(directory: PhysicalAddress, pwt: bool, pcd: bool) -> Self {
        debug_assert!(
            directory.as_u32() & 0xFFF == 0,
            "page directory base must be 4K-aligned"
        );
        Self::new()
            .with_pwt(pwt)
            .with_pcd(pcd)
            .with_directory_base_4k(directory.as_u32() >> 12)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u32;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_round_trip() {
        let cr3 = Cr3::from_directory_phys(PhysicalAddress::new(0x0011_5000), false, false);
        assert_eq!(cr3.into_bits(), 0x0011_5000);
        assert_eq!(cr3.directory_base_4k(), 0x115);
    }

    #[test]
    fn cache_flags() {
        let cr3 = Cr3::from_directory_phys(PhysicalAddress::new(0x0020_0000), true, true);
        assert_eq!(cr3.into_bits(), 0x0020_0018);
    }
}
