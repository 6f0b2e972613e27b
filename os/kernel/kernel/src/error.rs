use kernel_info::error::ErrorCode;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::VmemError;

/// Why the boot address space could not be built.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// The boot allocator ran past the end of physical memory.
    #[error("boot allocation of {requested:#x} bytes at {next} exceeds physical memory ending at {limit}")]
    OutOfMemory {
        requested: u32,
        next: PhysicalAddress,
        limit: PhysicalAddress,
    },
    /// The frame table does not fit the 4 MiB `UPAGES` window.
    #[error("frame table of {bytes:#x} bytes does not fit the UPAGES window")]
    FrameTableTooLarge { bytes: u32 },
    /// A mapping step failed.
    #[error(transparent)]
    Vmem(#[from] VmemError),
    /// The finished directory does not translate `va` as expected.
    #[error("boot address space check failed for {what} at {va}")]
    VerificationFailed { what: &'static str, va: VirtualAddress },
}

impl BootError {
    /// Closest kernel error number.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::OutOfMemory { .. } => ErrorCode::NoMemory,
            Self::Vmem(e) => e.code(),
            Self::FrameTableTooLarge { .. } | Self::VerificationFailed { .. } => ErrorCode::Invalid,
        }
    }
}
