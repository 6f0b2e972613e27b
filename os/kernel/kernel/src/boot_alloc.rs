//! # Boot allocator
//!
//! Before the frame table exists, memory is carved off the end of the
//! kernel image with a bump pointer. Allocations are page aligned and never
//! freed; everything below [`BootAllocator::end`] is later reserved in the
//! frame table.

use crate::error::BootError;
use kernel_info::memory::PGSIZE;
use kernel_memory_addresses::PhysicalAddress;

pub struct BootAllocator {
    next: PhysicalAddress,
    limit: PhysicalAddress,
}

impl BootAllocator {
    /// Start handing out memory at the first page boundary at or after
    /// `kernel_end`, never going past `limit`.
    #[must_use]
    pub const fn new(kernel_end: PhysicalAddress, limit: PhysicalAddress) -> Self {
        Self {
            next: PhysicalAddress::new(round_up_page(kernel_end.as_u32())),
            limit,
        }
    }

    /// Allocate `bytes` rounded up to whole pages.
    ///
    /// # Errors
    /// [`BootError::OutOfMemory`] if the allocation would end past `limit`.
    pub fn alloc(&mut self, bytes: u32) -> Result<PhysicalAddress, BootError> {
        let start = self.next;
        let size = u64::from(bytes).next_multiple_of(u64::from(PGSIZE));
        let end = u64::from(start.as_u32()) + size;
        if end > u64::from(self.limit.as_u32()) {
            return Err(BootError::OutOfMemory {
                requested: bytes,
                next: start,
                limit: self.limit,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let end = PhysicalAddress::new(end as u32);
        self.next = end;
        log::trace!("boot_alloc {bytes:#x} bytes at {start}");
        Ok(start)
    }

    /// First physical address not handed out yet.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.next
    }
}

const fn round_up_page(v: u32) -> u32 {
    v.next_multiple_of(PGSIZE)
}
