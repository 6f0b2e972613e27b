//! # Frame table and free list
//!
//! One [`FrameDescriptor`] per physical 4 KiB frame, indexed by frame number.
//! The free list is threaded through the descriptors themselves: each free
//! descriptor stores the number of the next free frame, so list operations
//! touch no memory beyond the table.
//!
//! ```text
//!  head ──► [ 0x151 ] ──► [ 0x152 ] ──► … ──► [ npage-1 ] ──► NIL
//! ```
//!
//! The table is exported read-only to user space at `UPAGES`, so the layout is
//! `#[repr(C)]` and fixed at eight bytes per frame.

use kernel_vmem::Frame;

/// Sentinel link: end of the free list.
pub const NIL: u32 = u32::MAX;

/// Life-cycle of one frame.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameState {
    /// On the free list.
    Free = 0,
    /// Handed out by the allocator; may or may not be referenced.
    Allocated = 1,
    /// Never entered the free list (firmware, I/O hole, boot image).
    Reserved = 2,
}

/// Bookkeeping for one physical frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameDescriptor {
    next: u32,
    refcount: u16,
    state: FrameState,
}

const _: () = assert!(size_of::<FrameDescriptor>() == 8);

impl FrameDescriptor {
    /// A reserved, unreferenced descriptor.
    pub const RESERVED: Self = Self {
        next: NIL,
        refcount: 0,
        state: FrameState::Reserved,
    };

    #[inline]
    #[must_use]
    pub const fn refcount(&self) -> u16 {
        self.refcount
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> FrameState {
        self.state
    }

    #[inline]
    pub(crate) const fn set_refcount(&mut self, refcount: u16) {
        self.refcount = refcount;
    }
}

/// The descriptor array plus the head of the intrusive free list.
pub struct FrameTable<'a> {
    descriptors: &'a mut [FrameDescriptor],
    head: u32,
    free_count: u32,
}

impl<'a> FrameTable<'a> {
    /// Wrap `descriptors`, marking every frame reserved and the list empty.
    ///
    /// # Panics
    /// If the table has more than 2^20 entries (beyond 32-bit physical memory).
    pub fn new(descriptors: &'a mut [FrameDescriptor]) -> Self {
        assert!(descriptors.len() <= 1 << 20, "frame table larger than 4 GiB of RAM");
        descriptors.fill(FrameDescriptor::RESERVED);
        Self {
            descriptors,
            head: NIL,
            free_count: 0,
        }
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn len(&self) -> u32 {
        self.descriptors.len() as u32
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> u32 {
        self.free_count
    }

    #[must_use]
    pub fn descriptors(&self) -> &[FrameDescriptor] {
        self.descriptors
    }

    /// Descriptor of `frame`, if it is inside the table.
    #[inline]
    #[must_use]
    pub fn get(&self, frame: Frame) -> Option<&FrameDescriptor> {
        self.descriptors.get(frame.index())
    }

    #[inline]
    pub fn get_mut(&mut self, frame: Frame) -> Option<&mut FrameDescriptor> {
        self.descriptors.get_mut(frame.index())
    }

    /// Link every frame for which `usable` holds into the list, lowest first.
    ///
    /// Used once by the allocator's initialisation; the list must be empty.
    pub(crate) fn build(&mut self, mut usable: impl FnMut(Frame) -> bool) {
        debug_assert_eq!(self.head, NIL);
        let mut tail = NIL;
        for number in 0..self.len() {
            let frame = Frame::new(number);
            if !usable(frame) {
                continue;
            }
            let d = &mut self.descriptors[frame.index()];
            d.next = NIL;
            d.refcount = 0;
            d.state = FrameState::Free;
            if tail == NIL {
                self.head = number;
            } else {
                self.descriptors[tail as usize].next = number;
            }
            tail = number;
            self.free_count += 1;
        }
    }

    /// Push `frame` in front of the list. O(1).
    pub(crate) fn push_front(&mut self, frame: Frame) {
        let head = self.head;
        let d = &mut self.descriptors[frame.index()];
        d.next = head;
        d.state = FrameState::Free;
        self.head = frame.number();
        self.free_count += 1;
    }

    /// Unlink the first free frame. O(1).
    pub(crate) fn pop_front(&mut self) -> Option<Frame> {
        if self.head == NIL {
            return None;
        }
        let frame = Frame::new(self.head);
        let d = &mut self.descriptors[frame.index()];
        self.head = d.next;
        d.next = NIL;
        d.state = FrameState::Allocated;
        self.free_count -= 1;
        Some(frame)
    }

    /// Walk the free list from the head.
    pub fn free_frames(&self) -> impl Iterator<Item = Frame> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let frame = Frame::new(cursor);
            cursor = self.descriptors[frame.index()].next;
            Some(frame)
        })
    }
}
