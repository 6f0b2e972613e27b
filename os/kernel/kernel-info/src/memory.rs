//! # Memory Layout
//!
//! Bit-exact constants of the 32-bit virtual memory map. The boot assembly,
//! the linker script and user programs depend on these values.
//!
//! ```text
//!    4 GiB  +------------------------------+
//!           |  Remapped physical memory    | RW/--
//! KERNBASE  +------------------------------+ 0xF000_0000
//!           |  Current page table (VPT)    | RW/--  PTSIZE
//! VPT,      +------------------------------+ 0xEFC0_0000
//! KSTACKTOP |  Kernel stack                | RW/--  KSTKSIZE
//!           | - - - - - - - - - - - - - - -|
//!           |  Invalid memory (guard)      | --/--
//! ULIM      +------------------------------+ 0xEF80_0000
//!           |  Current page table (UVPT)   | R-/R-  PTSIZE
//! UVPT      +------------------------------+ 0xEF40_0000
//!           |  Frame table (read only)     | R-/R-  PTSIZE
//! UPAGES    +------------------------------+ 0xEF00_0000
//!           |  Kernel state (read only)    | R-/R-  PTSIZE
//! UTOP,     +------------------------------+ 0xEEC0_0000
//! UENVS     |  User exception stack        | RW/RW  PGSIZE
//!           +------------------------------+ 0xEEBF_F000
//!           |  Empty                       | --/--  PGSIZE
//! USTACKTOP +------------------------------+ 0xEEBF_E000
//!           |  User stack, data, heap      |
//! UTEXT     +------------------------------+ 0x0080_0000
//! PFTEMP    |  Empty                       |        PTSIZE
//! UTEMP     +------------------------------+ 0x0040_0000
//!           |  Empty / stab data           |        PTSIZE
//!        0  +------------------------------+
//! ```
//!
//! Nothing in `[ULIM, KSTACKTOP - KSTKSIZE)` is ever mapped.

/// Bytes mapped by one page (one frame).
pub const PGSIZE: u32 = 4096;

/// log2([`PGSIZE`]).
pub const PGSHIFT: u32 = 12;

/// Entries in a page directory.
pub const NPDENTRIES: usize = 1024;

/// Entries in a page table.
pub const NPTENTRIES: usize = 1024;

/// Bytes mapped by one page directory entry.
pub const PTSIZE: u32 = PGSIZE * 1024;

/// log2([`PTSIZE`]).
pub const PTSHIFT: u32 = 22;

/// All of physical memory is mapped at this address.
pub const KERNBASE: u32 = 0xF000_0000;

/// Virtual page table: the directory slot for this region points back at the
/// directory itself.
pub const VPT: u32 = KERNBASE - PTSIZE;

/// Top of the kernel stack.
pub const KSTACKTOP: u32 = VPT;

/// Size of the kernel stack.
pub const KSTKSIZE: u32 = 8 * PGSIZE;

/// Boundary between kernel and user; `ULIM` itself is never mapped.
pub const ULIM: u32 = KSTACKTOP - PTSIZE;

/// Same as [`VPT`] but read-only for users.
pub const UVPT: u32 = ULIM - PTSIZE;

/// Read-only copy of the frame table.
pub const UPAGES: u32 = UVPT - PTSIZE;

/// Read-only copies of global kernel state structures.
pub const UENVS: u32 = UPAGES - PTSIZE;

/// Top of user-accessible virtual memory.
pub const UTOP: u32 = UENVS;

/// Top of the one-page user exception stack.
pub const UXSTACKTOP: u32 = UTOP;

/// Top of the normal user stack; one guard page below the exception stack.
pub const USTACKTOP: u32 = UTOP - 2 * PGSIZE;

/// Where user programs begin.
pub const UTEXT: u32 = 2 * PTSIZE;

/// Temporary page mappings.
pub const UTEMP: u32 = PTSIZE;

/// Temporary mapping for the user page-fault handler.
pub const PFTEMP: u32 = UTEMP + PTSIZE - PGSIZE;

/// Location of the user-level debug symbol data.
pub const USTABDATA: u32 = PTSIZE / 2;

/// Start of the legacy I/O hole (640 KiB).
pub const IOPHYSMEM: u32 = 0x000A_0000;

/// End of the I/O hole; extended memory starts here (1 MiB).
pub const EXTPHYSMEM: u32 = 0x0010_0000;

/// Physical address the kernel image is linked to load at.
pub const KERNEL_LOAD_PHYS: u32 = EXTPHYSMEM;

/// Largest amount of physical memory the remap window can cover.
pub const REMAP_WINDOW_SIZE: u32 = 0u32.wrapping_sub(KERNBASE);

/// Clamp a user-supplied pointer so that anything above [`ULIM`] becomes
/// [`ULIM`], which is guaranteed to fault.
///
/// ```rust
/// # use kernel_info::memory::*;
/// assert_eq!(clamp_user_pointer(0x0080_0000), 0x0080_0000);
/// assert_eq!(clamp_user_pointer(KERNBASE), ULIM);
/// ```
#[inline]
#[must_use]
pub const fn clamp_user_pointer(va: u32) -> u32 {
    if va > ULIM { ULIM } else { va }
}

const _: () = {
    assert!(PGSIZE == 1 << PGSHIFT);
    assert!(PTSIZE == 1 << PTSHIFT);
    assert!(PTSIZE as usize == PGSIZE as usize * NPTENTRIES);
    assert!(KERNBASE.is_multiple_of(PTSIZE));
    assert!(VPT == 0xEFC0_0000);
    assert!(ULIM == 0xEF80_0000);
    assert!(UVPT == 0xEF40_0000);
    assert!(UPAGES == 0xEF00_0000);
    assert!(UTOP == 0xEEC0_0000);
    assert!(USTACKTOP == 0xEEBF_E000);
    assert!(UTEXT == 0x0080_0000);
    assert!(PFTEMP == 0x007F_F000);
    assert!(KSTKSIZE < PTSIZE);
    assert!(KSTACKTOP - KSTKSIZE > ULIM);
    assert!(REMAP_WINDOW_SIZE == 0x1000_0000);
    assert!(IOPHYSMEM < EXTPHYSMEM);
};
