//! # ELF Header Parsing
//!
//! Just enough of the 32-bit ELF format to find the program headers and the
//! entry point. The kernel image is ours, so only two things are checked: the
//! magic number, and that the program header table lies inside the header
//! page read from disk. An image failing either is refused and nothing past
//! the header page is loaded.

use core::mem::size_of;
use core::ptr::read_unaligned;

/// `"\x7FELF"` read as a little-endian `u32`.
pub const ELF_MAGIC: u32 = 0x464C_457F;

/// Program header type of a loadable segment.
pub const PT_LOAD: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names)]
struct Elf32Ehdr {
    e_magic: u32,
    e_ident: [u8; 12],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_shoff: u32,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names)]
struct Elf32Phdr {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_paddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
    p_align: u32,
}

/// Size of one program header; the table stride the loader assumes.
pub const PROGRAM_HEADER_SIZE: usize = size_of::<Elf32Phdr>();

const _: () = {
    assert!(size_of::<Elf32Ehdr>() == 52);
    assert!(PROGRAM_HEADER_SIZE == 32);
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ElfError {
    #[error("image is shorter than an ELF header")]
    Truncated,
    #[error("bad ELF magic {0:#010x}")]
    BadMagic(u32),
    #[error("program header table at {offset:#x} with {count} entries lies outside the header page")]
    ProgramHeadersOutOfBounds { offset: u32, count: u16 },
}

/// The parts of the ELF header the loader uses.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ElfHeader {
    pub entry: u32,
    pub phoff: u32,
    pub phnum: u16,
}

impl ElfHeader {
    /// Parse the header at the start of `bytes`, and check that the program
    /// header table fits inside `bytes` as well.
    ///
    /// # Errors
    /// If `bytes` is too short, the magic does not match, or the program
    /// header table runs past the end of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ElfError> {
        if bytes.len() < size_of::<Elf32Ehdr>() {
            return Err(ElfError::Truncated);
        }

        // SAFETY: bounds checked above; the header may sit at any alignment.
        let ehdr = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf32Ehdr>()) };
        if ehdr.e_magic != ELF_MAGIC {
            return Err(ElfError::BadMagic(ehdr.e_magic));
        }

        let out_of_bounds = ElfError::ProgramHeadersOutOfBounds {
            offset: ehdr.e_phoff,
            count: ehdr.e_phnum,
        };
        let end = (ehdr.e_phoff as usize)
            .checked_add(PROGRAM_HEADER_SIZE * usize::from(ehdr.e_phnum))
            .ok_or(out_of_bounds)?;
        if end > bytes.len() {
            return Err(out_of_bounds);
        }

        Ok(Self {
            entry: ehdr.e_entry,
            phoff: ehdr.e_phoff,
            phnum: ehdr.e_phnum,
        })
    }

    /// The `index`-th program header. `bytes` must be the buffer the header
    /// was parsed from.
    ///
    /// # Panics
    /// If `index >= self.phnum` or `bytes` is not the parsed buffer.
    #[must_use]
    pub fn program_header(&self, bytes: &[u8], index: u16) -> ProgramHeader {
        assert!(index < self.phnum, "program header {index} of {}", self.phnum);
        let start = self.phoff as usize + usize::from(index) * PROGRAM_HEADER_SIZE;
        let raw = &bytes[start..start + PROGRAM_HEADER_SIZE];

        // SAFETY: `raw` is exactly one header long.
        let ph = unsafe { read_unaligned(raw.as_ptr().cast::<Elf32Phdr>()) };
        ProgramHeader {
            kind: ph.p_type,
            offset: ph.p_offset,
            vaddr: ph.p_vaddr,
            filesz: ph.p_filesz,
            memsz: ph.p_memsz,
        }
    }
}

/// One program header, as far as the loader cares.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProgramHeader {
    /// `p_type`; [`PT_LOAD`] for loadable segments.
    pub kind: u32,
    /// Byte offset of the segment in the image.
    pub offset: u32,
    /// Destination address.
    pub vaddr: u32,
    /// Bytes stored in the image.
    pub filesz: u32,
    /// Bytes occupied in memory; the rest past `filesz` is zero.
    pub memsz: u32,
}

impl ProgramHeader {
    #[must_use]
    pub const fn is_loadable(&self) -> bool {
        self.kind == PT_LOAD
    }
}
