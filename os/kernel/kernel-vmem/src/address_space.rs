//! # Address Space (IA-32, page-directory rooted)
//!
//! Strongly-typed helpers to build and manipulate one two-level virtual
//! address space.
//!
//! ## Highlights
//!
//! - [`AddressSpace::walk`] / [`AddressSpace::walk_create`] locate the PTE
//!   for a virtual address, the latter allocating a missing page table.
//! - [`AddressSpace::insert`] / [`AddressSpace::remove`] map and unmap one
//!   4 KiB frame and keep the frame reference counts balanced.
//! - [`AddressSpace::lookup`] / [`AddressSpace::query`] translate without
//!   side effects.
//! - [`AddressSpace::map_region`] installs boot-time mappings of physical
//!   ranges that are not reference counted.
//! - [`AddressSpace::install_self_map`] points a directory slot back at the
//!   directory.
//!
//! ## Reference counting
//!
//! Every frame mapped through [`insert`](AddressSpace::insert) and every page
//! table frame created by [`walk_create`](AddressSpace::walk_create) holds one
//! reference per mapping. `insert` takes the new reference before dropping the
//! old one, so re-inserting a frame at the address it is already mapped to
//! only changes its permissions.
//!
//! ## Safety
//!
//! The provided [`PhysMapper`] must yield **writable** references to table
//! frames, and the directory frame must stay alive for the lifetime of the
//! handle.

use crate::page_table::pd::{PageDirectory, PdEntry, PdIndex};
use crate::page_table::pt::{PageTable, PtEntry};
use crate::page_table::split_indices;
use crate::{Frame, FrameAlloc, PageEntryBits, PhysMapper, Tlb, VmemError};
use kernel_info::memory::{KSTACKTOP, KSTKSIZE, PGSIZE, ULIM};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper, T: Tlb> {
    root: Frame,
    mapper: &'m M,
    tlb: &'m T,
}

/// A present translation as seen through [`AddressSpace::lookup`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Mapping {
    pub frame: Frame,
    pub flags: PageEntryBits,
}

/// Permissions of a page table created by [`AddressSpace::walk_create`].
///
/// Directory entries are permissive; the leaf PTE decides.
const PAGE_TABLE_LINK: PageEntryBits = PageEntryBits::user_rw();

impl<'m, M: PhysMapper, T: Tlb> AddressSpace<'m, M, T> {
    /// Wrap the directory stored in `root`.
    #[inline]
    pub const fn from_root(mapper: &'m M, tlb: &'m T, root: Frame) -> Self {
        Self { root, mapper, tlb }
    }

    #[inline]
    fn directory(&self) -> &PageDirectory {
        // SAFETY: the root frame holds a page directory for the lifetime of `self`.
        unsafe { self.mapper.phys_to_mut::<PageDirectory>(self.root.base()) }
    }

    #[inline]
    fn directory_mut(&mut self) -> &mut PageDirectory {
        // SAFETY: as above; `&mut self` keeps the borrow unique.
        unsafe { self.mapper.phys_to_mut::<PageDirectory>(self.root.base()) }
    }

    #[inline]
    fn table(&self, page: Frame) -> &PageTable {
        // SAFETY: `page` came from a present directory entry.
        unsafe { self.mapper.phys_to_mut::<PageTable>(page.base()) }
    }

    #[inline]
    fn table_mut(&mut self, page: Frame) -> &mut PageTable {
        // SAFETY: `page` came from a present directory entry or a fresh frame.
        unsafe { self.mapper.phys_to_mut::<PageTable>(page.base()) }
    }

    /// Copy of the PTE for `va`, if its page table exists.
    fn entry(&self, va: VirtualAddress) -> Option<PtEntry> {
        let (pdx, ptx, _) = split_indices(va);
        let pt_page = self.directory().get(pdx).page_table()?;
        Some(self.table(pt_page).get(ptx))
    }

    /// The page table behind directory slot `pdx`.
    ///
    /// # Errors
    /// [`VmemError::ForbiddenAddress`] when the slot is a self-map: its
    /// "page table" is the directory and its "PTEs" are directory entries.
    fn covering_table(
        &self,
        pdx: PdIndex,
        va: VirtualAddress,
    ) -> Result<Option<Frame>, VmemError> {
        match self.directory().get(pdx).page_table() {
            Some(page) if page == self.root => Err(VmemError::ForbiddenAddress(va)),
            table => Ok(table),
        }
    }

    /// Locate the PTE for `va` without creating anything.
    ///
    /// Returns `None` when the covering page table is absent or when `va`
    /// lies in a self-map window.
    pub fn walk(&mut self, va: VirtualAddress) -> Option<&mut PtEntry> {
        let (pdx, ptx, _) = split_indices(va);
        let pt_page = self.covering_table(pdx, va).ok()??;
        Some(self.table_mut(pt_page).entry_mut(ptx))
    }

    /// Locate the PTE for `va`, allocating a zeroed page table if needed.
    ///
    /// A new table is linked present, writable and user-accessible, and
    /// holds one reference on its frame.
    ///
    /// # Errors
    /// - [`VmemError::ForbiddenAddress`] when `va` lies in a self-map window.
    /// - [`VmemError::OutOfMemory`] when no frame is available for the table.
    pub fn walk_create<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Result<&mut PtEntry, VmemError> {
        let (pdx, ptx, _) = split_indices(va);
        let pt_page = match self.covering_table(pdx, va)? {
            Some(page) => page,
            None => {
                let frame = alloc.allocate()?;
                self.table_mut(frame).zero();
                alloc.incref(frame);
                self.directory_mut()
                    .set(pdx, PdEntry::make_table(frame, PAGE_TABLE_LINK));
                log::trace!("new page table {frame:?} for {}", pdx.base());
                frame
            }
        };
        Ok(self.table_mut(pt_page).entry_mut(ptx))
    }

    /// Map `frame` at `va` with `perm | present`.
    ///
    /// Any frame previously mapped at `va` loses one reference, after the new
    /// one is taken and the stale translation is invalidated.
    ///
    /// # Errors
    /// - [`VmemError::ForbiddenAddress`] for `va >= ULIM` or inside a
    ///   self-map window; nothing is allocated in that case.
    /// - [`VmemError::OutOfMemory`] if a page table is needed and none can be
    ///   allocated.
    pub fn insert<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        frame: Frame,
        va: VirtualAddress,
        perm: PageEntryBits,
    ) -> Result<(), VmemError> {
        if va.as_u32() >= ULIM {
            return Err(VmemError::ForbiddenAddress(va));
        }

        let entry = self.walk_create(alloc, va)?;
        alloc.incref(frame);
        let old = core::mem::replace(entry, PtEntry::make_4k(frame, perm.permissions()));
        self.tlb.invalidate_page(va);

        if let Some(old_frame) = old.frame() {
            alloc.decref(old_frame);
        }
        Ok(())
    }

    /// Unmap whatever is mapped at `va`. A no-op if nothing is.
    ///
    /// # Errors
    /// [`VmemError::ForbiddenAddress`] when `va` lies in a self-map window;
    /// the directory is left untouched.
    pub fn remove<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Result<(), VmemError> {
        let (pdx, ptx, _) = split_indices(va);
        let Some(pt_page) = self.covering_table(pdx, va)? else {
            return Ok(());
        };
        let entry = self.table_mut(pt_page).entry_mut(ptx);
        let Some(frame) = entry.frame() else {
            return Ok(());
        };
        *entry = PtEntry::zero();
        self.tlb.invalidate_page(va);
        alloc.decref(frame);
        Ok(())
    }

    /// The frame mapped at `va` and the entry bits, if any.
    #[must_use]
    pub fn lookup(&self, va: VirtualAddress) -> Option<Mapping> {
        let entry = self.entry(va)?;
        Some(Mapping {
            frame: entry.frame()?,
            flags: entry.flags().permissions(),
        })
    }

    /// Translate `va` to the physical address it reaches, offset included.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let frame = self.entry(va)?.frame()?;
        Some(frame.base() + va.page_offset())
    }

    /// Map `[va, va + len)` onto `[pa, pa + len)` with `perm | present`.
    ///
    /// Meant for static boot-time ranges: the target frames are not reference
    /// counted and no TLB invalidation is issued.
    ///
    /// # Errors
    /// - [`VmemError::Unaligned`] if `va`, `pa` or `len` is not page aligned.
    /// - [`VmemError::RegionOverflow`] if either range wraps past 4 GiB.
    /// - [`VmemError::GuardOverlap`] if the range touches the invalid guard
    ///   `[ULIM, KSTACKTOP - KSTKSIZE)`.
    /// - [`VmemError::OutOfMemory`] from page-table allocation.
    pub fn map_region<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        len: u32,
        perm: PageEntryBits,
    ) -> Result<(), VmemError> {
        if !va.is_page_aligned() || !pa.is_page_aligned() || len % PGSIZE != 0 {
            return Err(VmemError::Unaligned);
        }

        let start = u64::from(va.as_u32());
        let end = start + u64::from(len);
        if end > 1 << 32 || u64::from(pa.as_u32()) + u64::from(len) > 1 << 32 {
            return Err(VmemError::RegionOverflow { start: va, len });
        }
        if start < u64::from(KSTACKTOP - KSTKSIZE) && end > u64::from(ULIM) {
            return Err(VmemError::GuardOverlap { start: va, len });
        }

        let perm = perm.permissions();
        for i in 0..len / PGSIZE {
            let offset = i * PGSIZE;
            let frame = Frame::containing(pa + offset);
            let entry = self.walk_create(alloc, va + offset)?;
            *entry = PtEntry::make_4k(frame, perm);
        }

        log::debug!("mapped {va}..+{len:#x} -> {pa}");
        Ok(())
    }

    /// Point directory slot `slot` at the directory itself.
    ///
    /// The 4 MiB window at `slot.base()` then exposes every PTE of this
    /// address space, with the directory appearing as its own page table.
    pub fn install_self_map(&mut self, slot: PdIndex, perm: PageEntryBits) {
        let root = self.root;
        self.directory_mut()
            .set(slot, PdEntry::make_table(root, perm.permissions()));
    }

    /// Copy directory slot `from` into `to`.
    pub fn alias_directory_slot(&mut self, to: PdIndex, from: PdIndex) {
        let dir = self.directory_mut();
        dir.set(to, dir.get(from));
    }

    /// Clear directory slot `slot` without touching the table it pointed at.
    pub fn clear_directory_slot(&mut self, slot: PdIndex) {
        self.directory_mut().set(slot, PdEntry::zero());
    }

    /// Raw directory entry at `slot`.
    #[must_use]
    pub fn directory_entry(&self, slot: PdIndex) -> PdEntry {
        self.directory().get(slot)
    }
}
