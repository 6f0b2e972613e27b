//! # Reference-counted physical frame allocator
//!
//! Hands out 4 KiB frames from the [`FrameTable`] free list and tracks how
//! many mappings refer to each frame. A frame returns to the free list when
//! its last reference is dropped.
//!
//! Misuse is fatal: freeing a referenced or already free frame, dropping a
//! reference that does not exist, or naming a frame beyond the table all
//! panic. Running out of frames is the only recoverable failure.

use crate::frame_table::{FrameDescriptor, FrameState, FrameTable};
use kernel_info::memory::{EXTPHYSMEM, IOPHYSMEM, PGSIZE};
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::{Frame, FrameAlloc, OutOfMemory};

/// Physical frame allocator over a boot-allocated descriptor table.
pub struct FrameAllocator<'a> {
    table: FrameTable<'a>,
}

impl<'a> FrameAllocator<'a> {
    /// Build the allocator over `descriptors` (one per physical frame).
    ///
    /// Frame 0, the I/O hole `[IOPHYSMEM, EXTPHYSMEM)` and everything from
    /// `EXTPHYSMEM` up to `boot_end` (kernel image, boot page directory, the
    /// frame table itself) stay reserved. All other frames go on the free
    /// list in increasing address order.
    pub fn init(descriptors: &'a mut [FrameDescriptor], boot_end: PhysicalAddress) -> Self {
        let mut table = FrameTable::new(descriptors);
        let io_hole = (IOPHYSMEM / PGSIZE)..(EXTPHYSMEM / PGSIZE);
        let boot_image = (EXTPHYSMEM / PGSIZE)..boot_end.as_u32().div_ceil(PGSIZE);

        table.build(|frame| {
            let n = frame.number();
            n != 0 && !io_hole.contains(&n) && !boot_image.contains(&n)
        });

        log::info!(
            "frame allocator: {} frames, {} free, boot image ends at {boot_end}",
            table.len(),
            table.free_count()
        );
        Self { table }
    }

    fn descriptor(&self, frame: Frame) -> &FrameDescriptor {
        match self.table.get(frame) {
            Some(d) => d,
            None => panic!("{frame:?} beyond the frame table ({} frames)", self.table.len()),
        }
    }

    fn descriptor_mut(&mut self, frame: Frame) -> &mut FrameDescriptor {
        let npage = self.table.len();
        match self.table.get_mut(frame) {
            Some(d) => d,
            None => panic!("{frame:?} beyond the frame table ({npage} frames)"),
        }
    }

    /// Take the first frame off the free list. Its reference count is zero.
    ///
    /// # Errors
    /// [`OutOfMemory`] if the list is empty.
    pub fn alloc(&mut self) -> Result<Frame, OutOfMemory> {
        let frame = self.table.pop_front().ok_or(OutOfMemory)?;
        debug_assert_eq!(self.descriptor(frame).refcount(), 0);
        log::trace!("alloc {frame:?}");
        Ok(frame)
    }

    /// Return an unreferenced frame to the free list.
    ///
    /// # Panics
    /// If the frame is still referenced, already free, reserved or out of
    /// range.
    pub fn free(&mut self, frame: Frame) {
        let d = self.descriptor(frame);
        match d.state() {
            FrameState::Free => panic!("double free of {frame:?}"),
            FrameState::Reserved => panic!("free of reserved {frame:?}"),
            FrameState::Allocated => {}
        }
        assert!(
            d.refcount() == 0,
            "free of {frame:?} with {} references",
            d.refcount()
        );
        self.table.push_front(frame);
        log::trace!("free {frame:?}");
    }

    /// Add one reference.
    ///
    /// # Panics
    /// If the frame is free, out of range, or the count would overflow.
    pub fn incref(&mut self, frame: Frame) {
        let d = self.descriptor_mut(frame);
        assert!(d.state() != FrameState::Free, "incref of free {frame:?}");
        let Some(count) = d.refcount().checked_add(1) else {
            panic!("reference count overflow on {frame:?}");
        };
        d.set_refcount(count);
    }

    /// Drop one reference; an allocated frame whose count reaches zero goes
    /// back on the free list. Reserved frames stay reserved.
    ///
    /// # Panics
    /// If the count already is zero, or the frame is out of range.
    pub fn decref(&mut self, frame: Frame) {
        let d = self.descriptor_mut(frame);
        let Some(count) = d.refcount().checked_sub(1) else {
            panic!("decref of unreferenced {frame:?}");
        };
        d.set_refcount(count);
        if count == 0 && d.state() == FrameState::Allocated {
            self.free(frame);
        }
    }

    /// Current reference count of `frame`.
    #[must_use]
    pub fn refcount(&self, frame: Frame) -> u16 {
        self.descriptor(frame).refcount()
    }

    /// Whether `frame` is on the free list.
    #[must_use]
    pub fn is_free(&self, frame: Frame) -> bool {
        self.descriptor(frame).state() == FrameState::Free
    }

    #[must_use]
    pub const fn free_count(&self) -> u32 {
        self.table.free_count()
    }

    #[must_use]
    pub const fn total_frames(&self) -> u32 {
        self.table.len()
    }

    /// Read access to the table and its free list.
    #[must_use]
    pub const fn table(&self) -> &FrameTable<'a> {
        &self.table
    }
}

impl FrameAlloc for FrameAllocator<'_> {
    fn allocate(&mut self) -> Result<Frame, OutOfMemory> {
        self.alloc()
    }

    fn incref(&mut self, frame: Frame) {
        Self::incref(self, frame);
    }

    fn decref(&mut self, frame: Frame) {
        Self::decref(self, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn table(n: usize) -> Vec<FrameDescriptor> {
        vec![FrameDescriptor::RESERVED; n]
    }

    /// 1024 KiB base memory + 64 MiB extended memory.
    const NVRAM_FRAMES: usize = 16640;

    #[test]
    fn init_reserves_low_memory_and_boot_image() {
        let mut t = table(NVRAM_FRAMES);
        let alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0015_0000));

        // frame 0 + 96 I/O hole frames + 80 boot image frames
        assert_eq!(alloc.total_frames(), 16640);
        assert_eq!(alloc.free_count(), 16640 - 1 - 96 - 80);
        assert!(!alloc.is_free(Frame::new(0)));
        assert!(alloc.is_free(Frame::new(1)));
        assert!(alloc.is_free(Frame::new(0x9F)));
        assert!(!alloc.is_free(Frame::new(0xA0)));
        assert!(!alloc.is_free(Frame::new(0xFF)));
        assert!(!alloc.is_free(Frame::new(0x14F)));
        assert!(alloc.is_free(Frame::new(0x150)));
        assert!(alloc.is_free(Frame::new(16639)));
    }

    #[test]
    fn unaligned_boot_end_reserves_the_partial_frame() {
        let mut t = table(0x200);
        let alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0012_0001));
        assert!(!alloc.is_free(Frame::new(0x120)));
        assert!(alloc.is_free(Frame::new(0x121)));
    }

    #[test]
    fn free_list_is_ascending_and_unique() {
        let mut t = table(0x180);
        let alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0011_0000));
        let listed: Vec<u32> = alloc.table().free_frames().map(Frame::number).collect();
        assert!(listed.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(u32::try_from(listed.len()).unwrap(), alloc.free_count());
        assert_eq!(listed.first(), Some(&1));
        assert_eq!(listed.last(), Some(&0x17F));
    }

    #[test]
    fn alloc_takes_frame_off_the_list() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        let before = alloc.free_count();

        let f = alloc.alloc().unwrap();
        assert_eq!(f, Frame::new(1));
        assert_eq!(alloc.refcount(f), 0);
        assert!(!alloc.is_free(f));
        assert!(alloc.table().free_frames().all(|g| g != f));
        assert_eq!(alloc.free_count(), before - 1);
    }

    #[test]
    fn free_puts_frame_back_exactly_once() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        let f = alloc.alloc().unwrap();
        alloc.free(f);

        let listed: Vec<Frame> = alloc.table().free_frames().collect();
        assert_eq!(listed.iter().filter(|&&g| g == f).count(), 1);
        assert_eq!(listed.first(), Some(&f));
        let unique: HashSet<_> = listed.iter().collect();
        assert_eq!(unique.len(), listed.len());
    }

    #[test]
    fn exhaustion_and_recovery() {
        // frames 1..0xA0 usable only
        let mut t = table(0x100);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        let mut got = Vec::new();
        while let Ok(f) = alloc.alloc() {
            got.push(f);
        }
        assert_eq!(got.len(), 0x9F);
        assert_eq!(alloc.alloc(), Err(OutOfMemory));

        alloc.free(got[5]);
        assert_eq!(alloc.alloc(), Ok(got[5]));
    }

    #[test]
    fn decref_to_zero_frees() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        let f = alloc.alloc().unwrap();
        alloc.incref(f);
        alloc.incref(f);
        alloc.decref(f);
        assert_eq!(alloc.refcount(f), 1);
        assert!(!alloc.is_free(f));
        alloc.decref(f);
        assert!(alloc.is_free(f));
    }

    #[test]
    fn reserved_frames_never_reach_the_list() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_4000));
        let boot = Frame::new(0x102);
        alloc.incref(boot);
        alloc.decref(boot);
        assert!(!alloc.is_free(boot));
        assert!(alloc.table().free_frames().all(|g| g != boot));
    }

    #[test]
    #[should_panic(expected = "references")]
    fn free_of_referenced_frame_panics() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        let f = alloc.alloc().unwrap();
        alloc.incref(f);
        alloc.free(f);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_panics() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        let f = alloc.alloc().unwrap();
        alloc.free(f);
        alloc.free(f);
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn freeing_a_reserved_frame_panics() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        alloc.free(Frame::new(0));
    }

    #[test]
    #[should_panic(expected = "unreferenced")]
    fn decref_of_zero_panics() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        let f = alloc.alloc().unwrap();
        alloc.decref(f);
    }

    #[test]
    #[should_panic(expected = "beyond the frame table")]
    fn out_of_range_frame_panics() {
        let mut t = table(0x110);
        let mut alloc = FrameAllocator::init(&mut t, PhysicalAddress::new(0x0010_0000));
        alloc.incref(Frame::new(0x110));
    }
}
