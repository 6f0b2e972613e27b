//! Access to low physical memory before paging.
//!
//! The loader runs in protected mode with flat segments and paging off, so a
//! physical address is a pointer. Tests substitute a plain byte buffer.

use crate::disk::Sector;
use kernel_info::boot::SECTOR_SIZE;

/// Byte access to the physical memory the image is loaded into.
pub trait LoadMemory {
    /// The sector-sized block at `pa`.
    fn sector_mut(&mut self, pa: u32) -> &mut Sector;

    /// `len` bytes starting at `pa`.
    fn bytes(&self, pa: u32, len: u32) -> &[u8];

    /// Clear `len` bytes starting at `pa`.
    fn zero(&mut self, pa: u32, len: u32);
}

/// Physical memory addressed through identity pointers.
pub struct IdentityMemory {
    _private: (),
}

impl IdentityMemory {
    /// # Safety
    /// Paging must be off (or identity mapped), and every address the loader
    /// is handed must be RAM that nothing else is using. Address `0` is never
    /// valid.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl LoadMemory for IdentityMemory {
    fn sector_mut(&mut self, pa: u32) -> &mut Sector {
        // SAFETY: caller contract of `new`.
        unsafe { &mut *(pa as usize as *mut Sector) }
    }

    fn bytes(&self, pa: u32, len: u32) -> &[u8] {
        // SAFETY: caller contract of `new`.
        unsafe { core::slice::from_raw_parts(pa as usize as *const u8, len as usize) }
    }

    fn zero(&mut self, pa: u32, len: u32) {
        // SAFETY: caller contract of `new`.
        unsafe { core::ptr::write_bytes(pa as usize as *mut u8, 0, len as usize) }
    }
}

const _: () = assert!(size_of::<Sector>() == SECTOR_SIZE as usize);

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The first `len` bytes of physical memory.
    pub struct LowMemory {
        pub bytes: Vec<u8>,
    }

    impl LowMemory {
        /// Memory filled with `0xCC` so untouched bytes stand out.
        pub fn new(len: usize) -> Self {
            Self { bytes: vec![0xCC; len] }
        }
    }

    impl LoadMemory for LowMemory {
        fn sector_mut(&mut self, pa: u32) -> &mut Sector {
            let pa = pa as usize;
            (&mut self.bytes[pa..pa + SECTOR_SIZE as usize]).try_into().unwrap()
        }

        fn bytes(&self, pa: u32, len: u32) -> &[u8] {
            &self.bytes[pa as usize..(pa + len) as usize]
        }

        fn zero(&mut self, pa: u32, len: u32) {
            self.bytes[pa as usize..(pa + len) as usize].fill(0);
        }
    }
}
