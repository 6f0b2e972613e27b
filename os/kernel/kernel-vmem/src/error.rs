use kernel_info::error::ErrorCode;
use kernel_memory_addresses::VirtualAddress;

/// No free physical frame is left.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("out of physical memory")]
pub struct OutOfMemory;

/// Failures of the mapping operations on an [`AddressSpace`](crate::AddressSpace).
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmemError {
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),
    #[error("address {0} is at or above ULIM")]
    ForbiddenAddress(VirtualAddress),
    #[error("region {start}+{len:#x} overlaps the invalid guard below the kernel stack")]
    GuardOverlap { start: VirtualAddress, len: u32 },
    #[error("region {start}+{len:#x} wraps past the end of the address space")]
    RegionOverflow { start: VirtualAddress, len: u32 },
    #[error("region arguments must be page aligned")]
    Unaligned,
}

impl VmemError {
    /// The kernel error number reported for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::OutOfMemory(_) => ErrorCode::NoMemory,
            Self::ForbiddenAddress(_) => ErrorCode::Fault,
            Self::GuardOverlap { .. } | Self::RegionOverflow { .. } | Self::Unaligned => {
                ErrorCode::Invalid
            }
        }
    }
}
