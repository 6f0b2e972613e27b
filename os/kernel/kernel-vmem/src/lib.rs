//! # Virtual Memory Support
//!
//! IA-32 two-level paging for the kernel memory core.
//!
//! ## What you get
//! - An [`AddressSpace`] describing one page directory and the page tables
//!   hanging off it, with reference-counted `insert`/`remove`.
//! - A 32-bit [`PageEntryBits`] bitfield shared by directory and table entries.
//! - 4 KiB-aligned [`PageDirectory`] / [`PageTable`] wrappers and index helpers.
//! - A [`Frame`] handle naming one physical 4 KiB frame.
//! - The seams the mapper is generic over: [`FrameAlloc`], [`PhysMapper`], [`Tlb`].
//! - [`SelfMap`] arithmetic for the recursive directory slots.
//!
//! ## IA-32 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PDX  |  PTX  | Offset |
//! ```
//!
//! ```text
//!  CR3 → Page Directory → Page Table → 4 KiB frame
//!             │                │
//!             │                └───► PTE (maps one 4 KiB page)
//!             └────────────────────► PDE (points to a page table)
//! ```
//!
//! Both levels hold 1024 entries of 4 bytes, so one page table spans 4 MiB
//! and one directory spans the full 4 GiB.
//!
//! ## Forbidden region
//!
//! Nothing at or above `ULIM` can be mapped through [`AddressSpace::insert`];
//! that part of the address space belongs to the kernel and is populated once
//! at boot with [`AddressSpace::map_region`], which in turn refuses the
//! invalid guard between `ULIM` and the bottom of the kernel stack.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod error;
mod frame;
mod page_entry_bits;
pub mod page_table;
mod self_map;
mod tlb;

pub use crate::address_space::{AddressSpace, Mapping};
pub use crate::error::{OutOfMemory, VmemError};
pub use crate::frame::Frame;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{PageDirectory, PdEntry, PdIndex};
pub use crate::page_table::pt::{PageTable, PtEntry, PtIndex};
pub use crate::self_map::SelfMap;
pub use crate::tlb::{Invlpg, Tlb};
use kernel_memory_addresses::PhysicalAddress;

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Source of physical 4 KiB frames, with reference counting.
///
/// Frames handed out by [`allocate`](Self::allocate) start with a reference
/// count of zero; whoever stores the frame in a mapping takes a reference.
pub trait FrameAlloc {
    /// Take a frame off the free list.
    ///
    /// # Errors
    /// [`OutOfMemory`] when no frame is free.
    fn allocate(&mut self) -> Result<Frame, OutOfMemory>;

    /// Add one reference to `frame`.
    fn incref(&mut self, frame: Frame);

    /// Drop one reference from `frame`; the frame is freed when the count
    /// reaches zero.
    fn decref(&mut self, frame: Frame);
}

/// Converts physical addresses to usable references in the current virtual
/// address space (identity map during early boot, the `KERNBASE` remap window
/// afterwards).
///
/// # Safety
/// - `pa` must be mapped writable in the current page tables.
/// - Lifetime `'a` is unchecked; the mapping must remain valid for `'a`.
/// - Type `T` must match the bytes at `pa`.
pub trait PhysMapper {
    /// Convert a physical address to a mutable reference.
    ///
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{RefCell, UnsafeCell};
    use kernel_info::memory::{KSTACKTOP, KSTKSIZE, PGSIZE, ULIM, UVPT, VPT};
    use kernel_memory_addresses::VirtualAddress;

    /// A 4 KiB-aligned raw frame used as simulated physical RAM.
    #[repr(align(4096))]
    struct Aligned4K(#[allow(dead_code)] [u8; 4096]);

    /// Physical memory as a vector of frames; `pa / 4096` picks the frame.
    struct TestPhys {
        frames: Vec<UnsafeCell<Aligned4K>>,
    }

    impl TestPhys {
        fn with_frames(n: usize) -> Self {
            let frames = (0..n).map(|_| UnsafeCell::new(Aligned4K([0; 4096]))).collect();
            Self { frames }
        }
    }

    impl PhysMapper for TestPhys {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            let idx = (pa.as_u32() >> 12) as usize;
            debug_assert_eq!(pa.as_u32() & 0xFFF, 0);
            unsafe { &mut *self.frames[idx].get().cast::<T>() }
        }
    }

    /// Refcounting allocator over frames `1..n`; frame 0 holds the directory.
    struct TestAlloc {
        free: Vec<Frame>,
        refs: Vec<u16>,
        calls: usize,
    }

    impl TestAlloc {
        fn new(n: u32) -> Self {
            Self {
                free: (1..n).rev().map(Frame::new).collect(),
                refs: vec![0; n as usize],
                calls: 0,
            }
        }

        fn refcount(&self, f: Frame) -> u16 {
            self.refs[f.index()]
        }

        fn is_free(&self, f: Frame) -> bool {
            self.free.contains(&f)
        }
    }

    impl FrameAlloc for TestAlloc {
        fn allocate(&mut self) -> Result<Frame, OutOfMemory> {
            self.calls += 1;
            self.free.pop().ok_or(OutOfMemory)
        }

        fn incref(&mut self, frame: Frame) {
            self.calls += 1;
            self.refs[frame.index()] += 1;
        }

        fn decref(&mut self, frame: Frame) {
            self.calls += 1;
            let r = &mut self.refs[frame.index()];
            assert!(*r > 0, "decref of unreferenced frame");
            *r -= 1;
            if *r == 0 {
                self.free.push(frame);
            }
        }
    }

    #[derive(Default)]
    struct RecordingTlb {
        invalidated: RefCell<Vec<VirtualAddress>>,
    }

    impl Tlb for RecordingTlb {
        fn invalidate_page(&self, va: VirtualAddress) {
            self.invalidated.borrow_mut().push(va);
        }
    }

    const ROOT: Frame = Frame::new(0);

    #[test]
    fn insert_creates_table_and_leaf() {
        let phys = TestPhys::with_frames(16);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(16);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let page = alloc.allocate().unwrap();
        let va = VirtualAddress::new(0x0080_0000);
        space
            .insert(&mut alloc, page, va, PageEntryBits::user_rw())
            .unwrap();

        assert_eq!(alloc.refcount(page), 1);
        let pde = space.directory_entry(PdIndex::from(va));
        assert!(pde.flags().present() && pde.flags().writable() && pde.flags().user_access());
        let table = pde.page_table().unwrap();
        assert_eq!(alloc.refcount(table), 1);

        let m = space.lookup(va).unwrap();
        assert_eq!(m.frame, page);
        assert!(m.flags.user_access() && m.flags.writable());
        assert_eq!(
            space.query(VirtualAddress::new(0x0080_0ABC)),
            Some(page.base() + 0xABC)
        );
        assert_eq!(*tlb.invalidated.borrow(), vec![va]);
    }

    #[test]
    fn walk_has_no_side_effects() {
        let phys = TestPhys::with_frames(4);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(4);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        assert!(space.walk(VirtualAddress::new(0x1234_5000)).is_none());
        assert!(space.lookup(VirtualAddress::new(0x1234_5000)).is_none());
        assert_eq!(space.query(VirtualAddress::new(0x1234_5000)), None);
        assert_eq!(alloc.calls, 0);

        let pte = space
            .walk_create(&mut alloc, VirtualAddress::new(0x1234_5000))
            .unwrap();
        assert!(!pte.is_present());
        assert!(space.walk(VirtualAddress::new(0x1234_5000)).is_some());
        assert!(space.lookup(VirtualAddress::new(0x1234_5000)).is_none());
    }

    #[test]
    fn remap_same_frame_updates_permissions_only() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let page = alloc.allocate().unwrap();
        let va = VirtualAddress::new(0x0040_0000);
        space
            .insert(&mut alloc, page, va, PageEntryBits::user_rw())
            .unwrap();
        space
            .insert(&mut alloc, page, va, PageEntryBits::user_ro())
            .unwrap();

        assert_eq!(alloc.refcount(page), 1);
        assert!(!alloc.is_free(page));
        let m = space.lookup(va).unwrap();
        assert!(!m.flags.writable());
        assert!(m.flags.user_access());
    }

    #[test]
    fn replacing_a_mapping_drops_the_old_frame() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        let va = VirtualAddress::new(0x0040_1000);
        space.insert(&mut alloc, a, va, PageEntryBits::kernel_rw()).unwrap();
        space.insert(&mut alloc, b, va, PageEntryBits::kernel_rw()).unwrap();

        assert_eq!(alloc.refcount(a), 0);
        assert!(alloc.is_free(a));
        assert_eq!(alloc.refcount(b), 1);
        assert_eq!(space.lookup(va).unwrap().frame, b);
    }

    #[test]
    fn remove_frees_the_last_reference() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let page = alloc.allocate().unwrap();
        let va = VirtualAddress::new(0x0080_3000);
        space.insert(&mut alloc, page, va, PageEntryBits::user_rw()).unwrap();
        space.remove(&mut alloc, va).unwrap();

        assert!(space.lookup(va).is_none());
        assert!(alloc.is_free(page));
        assert_eq!(*tlb.invalidated.borrow(), vec![va, va]);

        // Second remove is a no-op.
        let calls = alloc.calls;
        space.remove(&mut alloc, va).unwrap();
        space.remove(&mut alloc, VirtualAddress::new(0x3000_0000)).unwrap();
        assert_eq!(alloc.calls, calls);
        assert_eq!(tlb.invalidated.borrow().len(), 2);
    }

    #[test]
    fn shared_frame_survives_one_unmap() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let page = alloc.allocate().unwrap();
        let first = VirtualAddress::new(0x0080_0000);
        let second = VirtualAddress::new(0x0080_1000);
        space.insert(&mut alloc, page, first, PageEntryBits::user_rw()).unwrap();
        space.insert(&mut alloc, page, second, PageEntryBits::user_ro()).unwrap();
        assert_eq!(alloc.refcount(page), 2);

        space.remove(&mut alloc, first).unwrap();
        assert_eq!(alloc.refcount(page), 1);
        assert!(!alloc.is_free(page));
        assert_eq!(space.lookup(second).unwrap().frame, page);
    }

    #[test]
    fn forbidden_region_is_rejected_before_allocating() {
        let phys = TestPhys::with_frames(4);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(4);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);
        let page = Frame::new(3);

        for va in [ULIM, ULIM + PGSIZE, VPT, 0xF000_0000, 0xFFFF_F000] {
            let err = space
                .insert(&mut alloc, page, VirtualAddress::new(va), PageEntryBits::kernel_rw())
                .unwrap_err();
            assert_eq!(err, VmemError::ForbiddenAddress(VirtualAddress::new(va)));
            assert_eq!(err.code(), kernel_info::error::ErrorCode::Fault);
        }
        assert_eq!(alloc.calls, 0);
        assert!(tlb.invalidated.borrow().is_empty());
    }

    #[test]
    fn self_map_window_cannot_be_mapped_or_unmapped() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let kernel = VirtualAddress::new(0xF000_0000);
        space
            .map_region(&mut alloc, kernel, PhysicalAddress::zero(), PGSIZE, PageEntryBits::kernel_rw())
            .unwrap();
        let window_table = space.directory_entry(PdIndex::from(kernel)).page_table().unwrap();
        assert_eq!(alloc.refcount(window_table), 1);

        let uvpt = SelfMap::new(VirtualAddress::new(UVPT));
        space.install_self_map(PdIndex::from(uvpt.base()), PageEntryBits::user_ro());
        let calls = alloc.calls;

        // The PTE slot for the kernel window's table, seen through the self-map.
        let alias = uvpt.table_address(kernel);
        let page = Frame::new(5);
        assert_eq!(
            space.insert(&mut alloc, page, alias, PageEntryBits::user_rw()),
            Err(VmemError::ForbiddenAddress(alias))
        );
        assert_eq!(space.remove(&mut alloc, alias), Err(VmemError::ForbiddenAddress(alias)));
        assert!(space.walk(alias).is_none());
        assert!(matches!(
            space.walk_create(&mut alloc, alias),
            Err(VmemError::ForbiddenAddress(_))
        ));

        assert_eq!(alloc.calls, calls);
        assert_eq!(alloc.refcount(window_table), 1);
        assert!(!alloc.is_free(window_table));
        assert_eq!(space.query(kernel + 0x10), Some(PhysicalAddress::new(0x10)));
        assert!(tlb.invalidated.borrow().is_empty());
    }

    #[test]
    fn out_of_memory_while_creating_a_table() {
        let phys = TestPhys::with_frames(2);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(2);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        // The only free frame is used for the data page; no frame left for a table.
        let page = alloc.allocate().unwrap();
        let err = space
            .insert(&mut alloc, page, VirtualAddress::new(0x0080_0000), PageEntryBits::user_rw())
            .unwrap_err();
        assert_eq!(err, VmemError::OutOfMemory(OutOfMemory));
        assert_eq!(alloc.refcount(page), 0);
    }

    #[test]
    fn map_region_is_not_refcounted() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let va = VirtualAddress::new(0xF000_0000);
        space
            .map_region(&mut alloc, va, PhysicalAddress::new(0), 4 * PGSIZE, PageEntryBits::kernel_rw())
            .unwrap();

        for i in 0..4 {
            let m = space.lookup(va + i * PGSIZE).unwrap();
            assert_eq!(m.frame, Frame::new(i));
            assert!(m.flags.writable() && !m.flags.user_access());
        }
        assert_eq!(alloc.refcount(Frame::new(2)), 0);
        assert!(space.lookup(va + 4 * PGSIZE).is_none());
        assert!(tlb.invalidated.borrow().is_empty());
    }

    #[test]
    fn map_region_reaches_the_top_of_memory() {
        let phys = TestPhys::with_frames(4);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(4);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let va = VirtualAddress::new(0xFFFF_E000);
        space
            .map_region(&mut alloc, va, PhysicalAddress::new(0x1000), 2 * PGSIZE, PageEntryBits::kernel_rw())
            .unwrap();
        assert_eq!(
            space.query(VirtualAddress::new(0xFFFF_FFFF)),
            Some(PhysicalAddress::new(0x2FFF))
        );

        let err = space
            .map_region(&mut alloc, va, PhysicalAddress::new(0), 3 * PGSIZE, PageEntryBits::kernel_rw())
            .unwrap_err();
        assert_eq!(err, VmemError::RegionOverflow { start: va, len: 3 * PGSIZE });
    }

    #[test]
    fn map_region_rejects_guard_and_misalignment() {
        let phys = TestPhys::with_frames(4);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(4);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);
        let kernel_rw = PageEntryBits::kernel_rw();

        let guard = VirtualAddress::new(ULIM);
        assert!(matches!(
            space.map_region(&mut alloc, guard, PhysicalAddress::zero(), PGSIZE, kernel_rw),
            Err(VmemError::GuardOverlap { .. })
        ));
        let straddle = VirtualAddress::new(ULIM - PGSIZE);
        assert!(matches!(
            space.map_region(&mut alloc, straddle, PhysicalAddress::zero(), 2 * PGSIZE, kernel_rw),
            Err(VmemError::GuardOverlap { .. })
        ));
        assert_eq!(
            space.map_region(&mut alloc, VirtualAddress::new(0x1001), PhysicalAddress::zero(), PGSIZE, kernel_rw),
            Err(VmemError::Unaligned)
        );
        assert_eq!(
            space.map_region(&mut alloc, VirtualAddress::new(0x1000), PhysicalAddress::zero(), 100, kernel_rw),
            Err(VmemError::Unaligned)
        );
        assert_eq!(alloc.calls, 0);

        // The kernel stack right above the guard is fine.
        let stack = VirtualAddress::new(KSTACKTOP - KSTKSIZE);
        space
            .map_region(&mut alloc, stack, PhysicalAddress::new(0x3000), PGSIZE, kernel_rw)
            .unwrap();
    }

    #[test]
    fn self_map_exposes_page_tables() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        let page = alloc.allocate().unwrap();
        let va = VirtualAddress::new(0x0080_2000);
        space.insert(&mut alloc, page, va, PageEntryBits::user_rw()).unwrap();
        let vpt = SelfMap::new(VirtualAddress::new(VPT));
        space.install_self_map(PdIndex::from(vpt.base()), PageEntryBits::kernel_rw());

        let table = space.directory_entry(PdIndex::from(va)).page_table().unwrap();
        assert_eq!(space.query(vpt.table_address(va)), Some(table.base()));
        assert_eq!(
            space.query(vpt.pte_address(va)),
            Some(table.base() + ((va.as_u32() >> 12) & 0x3FF) * 4)
        );
        assert_eq!(space.query(vpt.directory_address()), Some(ROOT.base()));
    }

    #[test]
    fn directory_slot_alias_and_clear() {
        let phys = TestPhys::with_frames(8);
        let tlb = RecordingTlb::default();
        let mut alloc = TestAlloc::new(8);
        let mut space = AddressSpace::from_root(&phys, &tlb, ROOT);

        space
            .map_region(
                &mut alloc,
                VirtualAddress::new(0xF000_0000),
                PhysicalAddress::zero(),
                PGSIZE,
                PageEntryBits::kernel_rw(),
            )
            .unwrap();
        space.alias_directory_slot(PdIndex::new(0), PdIndex::new(0x3C0));
        assert_eq!(space.query(VirtualAddress::new(0x10)), Some(PhysicalAddress::new(0x10)));

        space.clear_directory_slot(PdIndex::new(0));
        assert_eq!(space.query(VirtualAddress::new(0x10)), None);
        assert!(space.query(VirtualAddress::new(0xF000_0010)).is_some());
    }
}
