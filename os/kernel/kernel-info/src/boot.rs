//! # Boot Loader Interface
//!
//! Constants shared by the boot sector loader and the kernel image layout.

/// Bytes per disk sector.
pub const SECTOR_SIZE: u32 = 512;

/// Physical scratch address the loader reads the ELF header page into.
pub const ELF_SCRATCH: u32 = 0x0001_0000;

/// Bytes of the image read up front to obtain the ELF and program headers.
pub const ELF_HEADER_READ: u32 = 8 * SECTOR_SIZE;

/// Disk sector holding the first byte of the kernel image (sector 0 is the
/// boot sector).
pub const IMAGE_FIRST_SECTOR: u32 = 1;

/// Destination addresses are truncated to this mask before paging exists.
pub const LOAD_ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// Kernel entry function as jumped to by the loader.
pub type KernelEntryFn = unsafe extern "C" fn() -> !;

const _: () = {
    assert!(SECTOR_SIZE.is_power_of_two());
    assert!(ELF_HEADER_READ == crate::memory::PGSIZE);
    assert!(ELF_SCRATCH & (SECTOR_SIZE - 1) == 0);
};
