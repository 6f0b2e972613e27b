//! # Kernel remap window
//!
//! After the bootstrap, every detected physical address `pa` is reachable at
//! the kernel virtual address `KERNBASE + pa`. [`KernelPhysMapper`] does this
//! arithmetic, checks it against the amount of detected memory, and serves as
//! the [`PhysMapper`] through which the kernel edits page tables.
//!
//! The checked conversions come in two flavours: `validate_*` return a
//! [`TranslationError`], while [`kaddr`](KernelPhysMapper::kaddr),
//! [`paddr`](KernelPhysMapper::paddr) and
//! [`pa_to_frame`](KernelPhysMapper::pa_to_frame) treat a bad address as a
//! kernel bug and panic.
//!
//! ```rust
//! # use kernel_alloc::phys_mapper::KernelPhysMapper;
//! # use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! let window = KernelPhysMapper::new(16640);
//! let kva = window.kaddr(PhysicalAddress::new(0x0010_0000));
//! assert_eq!(kva, VirtualAddress::new(0xF010_0000));
//! assert_eq!(window.paddr(kva), PhysicalAddress::new(0x0010_0000));
//! ```

use kernel_info::memory::KERNBASE;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_sync::SyncOnceCell;
use kernel_vmem::{Frame, PhysMapper};

/// A rejected address translation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TranslationError {
    #[error("physical address {pa} lies beyond the {npage} detected frames")]
    PhysicalOutOfRange { pa: PhysicalAddress, npage: u32 },
    #[error("{0} is below KERNBASE")]
    NotKernelVirtual(VirtualAddress),
}

/// `KERNBASE + pa` translation bounded by the detected frame count.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KernelPhysMapper {
    total_frames: u32,
}

impl KernelPhysMapper {
    #[must_use]
    pub const fn new(total_frames: u32) -> Self {
        Self { total_frames }
    }

    #[must_use]
    pub const fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Kernel virtual address of `pa`.
    ///
    /// # Errors
    /// [`TranslationError::PhysicalOutOfRange`] if `pa >> 12` is not below the
    /// detected frame count.
    pub const fn validate_physical(&self, pa: PhysicalAddress) -> Result<VirtualAddress, TranslationError> {
        if pa.as_u32() >> 12 >= self.total_frames {
            return Err(TranslationError::PhysicalOutOfRange {
                pa,
                npage: self.total_frames,
            });
        }
        Ok(VirtualAddress::new(pa.as_u32().wrapping_add(KERNBASE)))
    }

    /// Physical address behind the remap-window address `kva`.
    ///
    /// # Errors
    /// [`TranslationError::NotKernelVirtual`] if `kva < KERNBASE`.
    pub const fn validate_kernel_virtual(&self, kva: VirtualAddress) -> Result<PhysicalAddress, TranslationError> {
        if kva.as_u32() < KERNBASE {
            return Err(TranslationError::NotKernelVirtual(kva));
        }
        Ok(PhysicalAddress::new(kva.as_u32() - KERNBASE))
    }

    /// # Panics
    /// On any address [`validate_physical`](Self::validate_physical) rejects.
    #[must_use]
    #[track_caller]
    pub fn kaddr(&self, pa: PhysicalAddress) -> VirtualAddress {
        match self.validate_physical(pa) {
            Ok(kva) => kva,
            Err(_) => panic!("kaddr called with invalid pa {pa}"),
        }
    }

    /// # Panics
    /// On any address [`validate_kernel_virtual`](Self::validate_kernel_virtual) rejects.
    #[must_use]
    #[track_caller]
    pub fn paddr(&self, kva: VirtualAddress) -> PhysicalAddress {
        match self.validate_kernel_virtual(kva) {
            Ok(pa) => pa,
            Err(_) => panic!("paddr called with invalid kva {kva}"),
        }
    }

    /// The frame containing `pa`.
    ///
    /// # Panics
    /// If `pa` lies beyond the detected frames.
    #[must_use]
    #[track_caller]
    pub fn pa_to_frame(&self, pa: PhysicalAddress) -> Frame {
        let frame = Frame::containing(pa);
        assert!(
            frame.number() < self.total_frames,
            "pa_to_frame called with invalid pa {pa}"
        );
        frame
    }
}

impl PhysMapper for KernelPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = self.kaddr(pa);
        // SAFETY: the remap window covers every detected frame; the caller
        // guarantees the bytes at `pa` are a `T`.
        unsafe { &mut *va.as_mut_ptr::<T>() }
    }
}

static PHYS_MAPPER: SyncOnceCell<KernelPhysMapper> = SyncOnceCell::new();

/// Publish the kernel's remap-window translator.
///
/// # Errors
/// Hands `mapper` back if one was installed before.
pub fn install_phys_mapper(mapper: KernelPhysMapper) -> Result<(), KernelPhysMapper> {
    PHYS_MAPPER.set(mapper)
}

/// The installed translator, if the bootstrap got that far.
#[must_use]
pub fn phys_mapper() -> Option<&'static KernelPhysMapper> {
    PHYS_MAPPER.get()
}
