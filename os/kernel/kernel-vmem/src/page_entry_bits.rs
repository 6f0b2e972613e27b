use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// A single 32-bit IA-32 paging entry in its raw bitfield form.
///
/// The same layout is shared by page directory entries (PDE) and page table
/// entries (PTE) when 4 MiB pages are not in use.
///
/// ### Bit layout
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (PTE only) |
/// | 7         | `PS`              | Page size (PDE only, unused here) |
/// | 8         | `G`               | Global (PTE only) |
/// | 9–11      | AVL               | Reserved for OS use |
/// | 12–31     | `frame`           | Physical frame number |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::new()
///     .with_present(true)
///     .with_writable(true)
///     .with_physical_address(PhysicalAddress::new(0x0012_3000));
/// assert_eq!(e.into_bits(), 0x0012_3003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Clear implies a not-present entry; every other bit is then ignored by
    /// the hardware.
    pub present: bool,

    /// Writable (RW, bit 1).
    ///
    /// Clear for read-only. With `CR0.WP` set this also binds the kernel.
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow CPL 3 access; clear restricts to the kernel.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU on first access.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on first write through a PTE.
    pub dirty: bool,

    /// Page Size (PS, bit 7).
    ///
    /// In a PDE, selects a 4 MiB page. The memory core never sets it.
    pub large_page: bool,

    /// Global (G, bit 8). Needs `CR4.PGE`; unused by the memory core.
    pub global_translation: bool,

    /// OS-available (bits 9..=11), ignored by hardware.
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame number (bits 12..=31).
    #[bits(20)]
    frame_bits_31_12: u32,
}

impl PageEntryBits {
    /// Mask of the permission and status bits (everything below the frame).
    pub const FLAGS_MASK: u32 = 0xFFF;

    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_frame_bits_31_12(phys.as_u32() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(mut self, phys: PhysicalAddress) -> Self {
        self.set_physical_address(phys);
        self
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.frame_bits_31_12() << 12)
    }

    /// The low twelve bits only; the frame field is cleared.
    #[inline]
    #[must_use]
    pub const fn permissions(self) -> Self {
        Self::from_bits(self.into_bits() & Self::FLAGS_MASK)
    }

    /// Kernel read/write: `P | W`.
    #[inline]
    #[must_use]
    pub const fn kernel_rw() -> Self {
        Self::new().with_present(true).with_writable(true)
    }

    /// User read-only: `P | U`.
    #[inline]
    #[must_use]
    pub const fn user_ro() -> Self {
        Self::new().with_present(true).with_user_access(true)
    }

    /// User read/write: `P | W | U`.
    #[inline]
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
    }
}
