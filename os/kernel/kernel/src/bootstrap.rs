//! # Boot address space
//!
//! Builds the first page directory the kernel runs on. The sequence is:
//!
//! 1. [`init_boot_memory`] bump-allocates the page directory and the frame
//!    table right after the kernel image and brings up the
//!    [`FrameAllocator`] over that table. Everything allocated so far stays
//!    reserved.
//! 2. [`build_boot_address_space`] fills the directory:
//!
//! ```text
//!  4 GiB ┌──────────────────────────────┐
//!        │ remap window  KERNBASE+pa→pa │ kernel RW, all detected memory
//! KERNBASE ├────────────────────────────┤
//!        │ VPT self-map                 │ kernel RW
//! KSTACKTOP├────────────────────────────┤
//!        │ kernel stack (KSTKSIZE)      │ kernel RW
//!        │ guard, never mapped          │
//!   ULIM ├──────────────────────────────┤
//!        │ UVPT self-map                │ user RO
//!   UVPT ├──────────────────────────────┤
//!        │ frame table                  │ user RO
//! UPAGES ├──────────────────────────────┤
//!        ┆                              ┆
//!    4 MiB ├────────────────────────────┤
//!        │ low alias of the first 4 MiB │ temporary, slot 0 = slot PDX(KERNBASE)
//!      0 └──────────────────────────────┘
//! ```
//!
//! 3. [`verify_boot_address_space`] walks the result and checks every region
//!    resolves to the frames it was built from.
//!
//! The low alias keeps the segment-translated entry code running while
//! paging is switched on; it is dropped once the flat GDT is loaded.

use crate::boot_alloc::BootAllocator;
use crate::error::BootError;
use crate::memory_detect::MemoryGeometry;
use core::mem::size_of;
use kernel_alloc::{FrameAllocator, FrameDescriptor};
use kernel_info::memory::{KERNBASE, KSTACKTOP, KSTKSIZE, PGSIZE, PTSIZE, ULIM, UPAGES, UVPT, VPT};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{AddressSpace, Frame, PageDirectory, PageEntryBits, PdIndex, PhysMapper, SelfMap, Tlb};

/// Where the kernel image ended up and how much memory there is.
#[derive(Copy, Clone, Debug)]
pub struct BootPlan {
    pub geometry: MemoryGeometry,
    /// First physical address past the kernel image.
    pub kernel_end: PhysicalAddress,
    /// Physical base of the `KSTKSIZE` bytes backing the kernel stack.
    pub kernel_stack: PhysicalAddress,
}

/// The boot page directory, the frame table and the allocator over it.
pub struct BootMemory<'a> {
    pub directory: Frame,
    pub frame_table: PhysicalAddress,
    /// Size of the frame table in bytes, page aligned.
    pub frame_table_bytes: u32,
    /// End of all boot allocations.
    pub boot_end: PhysicalAddress,
    pub allocator: FrameAllocator<'a>,
}

/// Slot `PDX(KERNBASE)`, the first slot of the remap window.
const KERNBASE_SLOT: PdIndex = PdIndex::from(VirtualAddress::new(KERNBASE));

#[allow(clippy::cast_possible_truncation)]
const DESCRIPTOR_SIZE: u32 = size_of::<FrameDescriptor>() as u32;

/// Slot 0, aliased onto the remap window until the flat GDT is loaded.
pub const LOW_ALIAS_SLOT: PdIndex = PdIndex::new(0);

/// Bump-allocate the page directory and the frame table after the kernel
/// image, zero both and build the frame allocator.
///
/// # Errors
/// - [`BootError::FrameTableTooLarge`] if the table would not fit `UPAGES`.
/// - [`BootError::OutOfMemory`] if the boot allocations run past `maxpa`.
///
/// # Safety
/// `mapper` must reach `[plan.kernel_end, maxpa)` as writable memory for
/// `'a`, and nothing else may use that range while the allocator lives.
pub unsafe fn init_boot_memory<'a, M: PhysMapper>(
    mapper: &M,
    plan: &BootPlan,
) -> Result<BootMemory<'a>, BootError> {
    let npage = plan.geometry.total_frames;
    let table_bytes = npage.saturating_mul(DESCRIPTOR_SIZE);
    if table_bytes > PTSIZE {
        return Err(BootError::FrameTableTooLarge { bytes: table_bytes });
    }
    let frame_table_bytes = table_bytes.next_multiple_of(PGSIZE);

    let mut boot = BootAllocator::new(plan.kernel_end, plan.geometry.maxpa);
    let directory = boot.alloc(PGSIZE)?;
    let frame_table = boot.alloc(frame_table_bytes)?;
    let boot_end = boot.end();

    // SAFETY: both ranges were just carved out of memory the caller handed
    // over; all-zero bytes are a valid (free, unreferenced) descriptor.
    let descriptors = unsafe {
        mapper.phys_to_mut::<PageDirectory>(directory).zero();
        let base = core::ptr::from_mut(mapper.phys_to_mut::<FrameDescriptor>(frame_table));
        core::ptr::write_bytes(base.cast::<u8>(), 0, frame_table_bytes as usize);
        core::slice::from_raw_parts_mut(base, npage as usize)
    };

    log::debug!("boot directory at {directory}, frame table at {frame_table} ({npage} frames)");
    let allocator = FrameAllocator::init(descriptors, boot_end);

    Ok(BootMemory {
        directory: Frame::containing(directory),
        frame_table,
        frame_table_bytes,
        boot_end,
        allocator,
    })
}

/// Fill the boot directory: frame table at `UPAGES`, kernel stack, remap
/// window, both self-maps and the temporary low alias.
///
/// Page tables come from `memory.allocator` and hold one reference each.
///
/// # Errors
/// [`BootError::Vmem`] if a region cannot be mapped, most likely because
/// the allocator ran out of frames for page tables.
pub fn build_boot_address_space<'m, M: PhysMapper, T: Tlb>(
    mapper: &'m M,
    tlb: &'m T,
    memory: &mut BootMemory<'_>,
    plan: &BootPlan,
) -> Result<AddressSpace<'m, M, T>, BootError> {
    let mut space = AddressSpace::from_root(mapper, tlb, memory.directory);
    let alloc = &mut memory.allocator;
    let free_before = alloc.free_count();

    space.map_region(
        alloc,
        VirtualAddress::new(UPAGES),
        memory.frame_table,
        memory.frame_table_bytes,
        PageEntryBits::user_ro(),
    )?;
    space.map_region(
        alloc,
        VirtualAddress::new(KSTACKTOP - KSTKSIZE),
        plan.kernel_stack,
        KSTKSIZE,
        PageEntryBits::kernel_rw(),
    )?;
    space.map_region(
        alloc,
        VirtualAddress::new(KERNBASE),
        PhysicalAddress::zero(),
        plan.geometry.maxpa.as_u32(),
        PageEntryBits::kernel_rw(),
    )?;

    space.install_self_map(PdIndex::from(VirtualAddress::new(VPT)), PageEntryBits::kernel_rw());
    space.install_self_map(PdIndex::from(VirtualAddress::new(UVPT)), PageEntryBits::user_ro());
    space.alias_directory_slot(LOW_ALIAS_SLOT, KERNBASE_SLOT);

    log::info!(
        "boot address space built with {} page tables, {} frames free",
        free_before - alloc.free_count(),
        alloc.free_count()
    );
    Ok(space)
}

/// Remove the low alias once the kernel runs on flat segments. The caller
/// reloads CR3 afterwards to flush the stale translations.
pub fn drop_low_alias<M: PhysMapper, T: Tlb>(space: &mut AddressSpace<'_, M, T>) {
    space.clear_directory_slot(LOW_ALIAS_SLOT);
}

/// Check the directory built by [`build_boot_address_space`].
///
/// # Errors
/// [`BootError::VerificationFailed`] naming the first region that does not
/// translate as built.
pub fn verify_boot_address_space<M: PhysMapper, T: Tlb>(
    space: &AddressSpace<'_, M, T>,
    memory: &BootMemory<'_>,
    plan: &BootPlan,
) -> Result<(), BootError> {
    let maxpa = plan.geometry.maxpa.as_u32();
    let last = maxpa.saturating_sub(PGSIZE);
    for pa in (0..maxpa).step_by(PTSIZE as usize).chain([last]) {
        expect_page(space, "remap window", KERNBASE + pa, PhysicalAddress::new(pa), kernel_rw)?;
    }

    for offset in (0..memory.frame_table_bytes).step_by(PGSIZE as usize) {
        expect_page(space, "UPAGES", UPAGES + offset, memory.frame_table + offset, user_ro)?;
    }

    for offset in (0..KSTKSIZE).step_by(PGSIZE as usize) {
        let va = KSTACKTOP - KSTKSIZE + offset;
        expect_page(space, "kernel stack", va, plan.kernel_stack + offset, kernel_rw)?;
    }

    for va in [ULIM, KSTACKTOP - KSTKSIZE - PGSIZE] {
        if space.query(VirtualAddress::new(va)).is_some() {
            return Err(failed("stack guard", va));
        }
    }

    let self_maps: [(&'static str, u32, fn(PageEntryBits) -> bool); 2] = [
        ("VPT self-map", VPT, kernel_rw),
        ("UVPT self-map", UVPT, user_ro),
    ];
    for (what, base, perm_ok) in self_maps {
        let directory = SelfMap::new(VirtualAddress::new(base)).directory_address();
        expect_page(space, what, directory.as_u32(), memory.directory.base(), perm_ok)?;
    }

    if space.directory_entry(LOW_ALIAS_SLOT) != space.directory_entry(KERNBASE_SLOT) {
        return Err(failed("low alias", 0));
    }

    log::debug!("boot address space verified");
    Ok(())
}

const fn kernel_rw(flags: PageEntryBits) -> bool {
    flags.present() && flags.writable() && !flags.user_access()
}

const fn user_ro(flags: PageEntryBits) -> bool {
    flags.present() && !flags.writable() && flags.user_access()
}

fn expect_page<M: PhysMapper, T: Tlb>(
    space: &AddressSpace<'_, M, T>,
    what: &'static str,
    va: u32,
    pa: PhysicalAddress,
    perm_ok: fn(PageEntryBits) -> bool,
) -> Result<(), BootError> {
    match space.lookup(VirtualAddress::new(va)) {
        Some(m) if m.frame.base() == pa && perm_ok(m.flags) => Ok(()),
        _ => Err(failed(what, va)),
    }
}

const fn failed(what: &'static str, va: u32) -> BootError {
    BootError::VerificationFailed {
        what,
        va: VirtualAddress::new(va),
    }
}
