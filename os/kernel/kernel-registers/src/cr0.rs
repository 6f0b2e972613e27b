use bitfield_struct::bitfield;

/// Architectural model of CR0 on IA-32.
///
/// Exposes all architecturally defined control bits as booleans and keeps
/// all reserved bits forced to 0.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Cr0 {
    /// Bit 0: Protection Enable (PE).
    ///
    /// - 0: Real mode (no paging, no protection).
    /// - 1: Protected mode (required for paging).
    pub pe_protection_enable: bool,

    /// Bit 1: Monitor Coprocessor (MP).
    ///
    /// Controls interaction of WAIT/FWAIT with TS in CR0 for x87.
    pub mp_monitor_coprocessor: bool,

    /// Bit 2: Emulation (EM).
    ///
    /// - 1: No x87 present; all x87 instructions fault.
    /// - 0: x87 instructions executed normally.
    pub em_emulation: bool,

    /// Bit 3: Task Switched (TS).
    ///
    /// Set on task switch; used to manage lazy x87 state.
    pub ts_task_switched: bool,

    /// Bit 4: Extension Type (ET).
    pub et_extension_type: bool,

    /// Bit 5: Numeric Error (NE).
    ///
    /// - 1: x87 errors reported via exceptions (#MF).
    /// - 0: x87 errors signaled via external IRQ 13 (legacy).
    pub ne_numeric_error: bool,

    /// Bits 6–15: Reserved (must be 0).
    #[bits(10, default = 0)]
    _reserved_6_15: u16,

    /// Bit 16: Write Protect (WP).
    ///
    /// When set, supervisor code must respect read-only pages.
    pub wp_write_protect: bool,

    /// Bit 17: Reserved (must be 0).
    #[bits(default = false)]
    _reserved_17: bool,

    /// Bit 18: Alignment Mask (AM).
    pub am_alignment_mask: bool,

    /// Bits 19–28: Reserved (must be 0).
    #[bits(10, default = 0)]
    _reserved_19_28: u16,

    /// Bit 29: Not-Write-Through (NW).
    pub nw_not_write_through: bool,

    /// Bit 30: Cache Disable (CD).
    pub cd_cache_disable: bool,

    /// Bit 31: Paging (PG).
    ///
    /// - 0: Paging disabled.
    /// - 1: Paging enabled (requires PE=1).
    pub pg_paging: bool,
}

impl Cr0 {
    /// The value loaded when switching paging on: protection, paging,
    /// alignment checks, supervisor write protection and native x87 error
    /// reporting enabled; `TS` and `EM` cleared so the FPU is usable.
    #[inline]
    #[must_use]
    pub const fn with_paging_enabled(self) -> Self {
        self.with_pe_protection_enable(true)
            .with_pg_paging(true)
            .with_am_alignment_mask(true)
            .with_wp_write_protect(true)
            .with_ne_numeric_error(true)
            .with_mp_monitor_coprocessor(true)
            .with_ts_task_switched(false)
            .with_em_emulation(false)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let mut cr0: u32;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}
