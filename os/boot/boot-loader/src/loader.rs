//! # ELF Image Loader
//!
//! Reads the kernel's ELF image from the disk sectors after the boot sector
//! and places every segment at its load address:
//!
//! 1. Read the first page of the image into [`ELF_SCRATCH`].
//! 2. Check the ELF magic. On mismatch, stop without jumping.
//! 3. For every program header, read `memsz` bytes from the segment's file
//!    offset to `vaddr & 0xFFFFFF`, whole sectors at a time.
//! 4. Hand back `entry & 0xFFFFFF`.
//!
//! Destination addresses are masked because the kernel is linked at
//! `KERNBASE` but loaded at its physical address; paging is still off.
//!
//! A segment's start is rounded down to a sector boundary, so a few bytes
//! before it may be overwritten. Segments are loaded in increasing address
//! order, so the previous segment's bytes there are rewritten with the same
//! contents.

use crate::disk::SectorDisk;
use crate::elf::{ElfError, ElfHeader, ProgramHeader};
use crate::memory::LoadMemory;
use kernel_info::boot::{ELF_HEADER_READ, ELF_SCRATCH, IMAGE_FIRST_SECTOR, LOAD_ADDRESS_MASK, SECTOR_SIZE};

/// Which program headers are loaded.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum SegmentPolicy {
    /// Every program header, regardless of type and flags.
    #[default]
    TrustAll,
    /// Only `PT_LOAD` headers.
    LoadableOnly,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoaderConfig {
    pub segments: SegmentPolicy,
    /// Clear `[vaddr + filesz, vaddr + memsz)` after reading a segment.
    pub zero_fill: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            segments: SegmentPolicy::TrustAll,
            zero_fill: true,
        }
    }
}

/// Sectors `first..first + count` read for one segment.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SectorRange {
    pub first: u32,
    pub count: u32,
}

impl SectorRange {
    /// The last sector read, if any.
    #[must_use]
    pub const fn last(&self) -> Option<u32> {
        if self.count == 0 { None } else { Some(self.first + self.count - 1) }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("not a kernel image: {0}")]
    Elf(#[from] ElfError),
}

/// Read `count` bytes at image offset `offset` to physical address `va`.
///
/// Returns the sectors read. May write up to a sector before `va` and past
/// `va + count`. A range that wraps past 4 GiB reads nothing.
pub fn read_segment<D, M>(disk: &mut D, memory: &mut M, va: u32, count: u32, offset: u32) -> SectorRange
where
    D: SectorDisk + ?Sized,
    M: LoadMemory + ?Sized,
{
    let va = va & LOAD_ADDRESS_MASK;
    let end = va.wrapping_add(count);

    let mut dst = va & !(SECTOR_SIZE - 1);
    let first = offset / SECTOR_SIZE + IMAGE_FIRST_SECTOR;

    let mut lba = first;
    while dst < end {
        disk.read_sector(lba, memory.sector_mut(dst));
        lba += 1;
        let Some(next) = dst.checked_add(SECTOR_SIZE) else {
            break;
        };
        dst = next;
    }

    SectorRange {
        first,
        count: lba - first,
    }
}

/// Load the image on `disk` into `memory` and return its physical entry
/// address.
///
/// `on_segment` sees every segment after it was placed, with the sectors it
/// came from. Skipped headers are not reported.
///
/// # Errors
/// [`LoadError::Elf`] if the first page is not an ELF header; nothing past
/// the scratch page has been written then.
pub fn load_image<D, M, F>(disk: &mut D, memory: &mut M, config: LoaderConfig, mut on_segment: F) -> Result<u32, LoadError>
where
    D: SectorDisk + ?Sized,
    M: LoadMemory + ?Sized,
    F: FnMut(&ProgramHeader, SectorRange),
{
    read_segment(disk, memory, ELF_SCRATCH, ELF_HEADER_READ, 0);
    let header = ElfHeader::parse(memory.bytes(ELF_SCRATCH, ELF_HEADER_READ))?;

    for index in 0..header.phnum {
        // Re-read per header: a segment may land on top of the scratch page.
        let ph = header.program_header(memory.bytes(ELF_SCRATCH, ELF_HEADER_READ), index);
        if config.segments == SegmentPolicy::LoadableOnly && !ph.is_loadable() {
            log::trace!("skipping program header {index} of type {}", ph.kind);
            continue;
        }

        let sectors = read_segment(disk, memory, ph.vaddr, ph.memsz, ph.offset);
        let va = ph.vaddr & LOAD_ADDRESS_MASK;
        if config.zero_fill && ph.memsz > ph.filesz && va.checked_add(ph.memsz).is_some() {
            memory.zero(va + ph.filesz, ph.memsz - ph.filesz);
        }
        on_segment(&ph, sectors);
    }

    Ok(header.entry & LOAD_ADDRESS_MASK)
}
