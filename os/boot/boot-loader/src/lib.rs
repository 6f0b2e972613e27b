//! # Boot Sector Loader
//!
//! Second half of the boot sector. The assembly stub switches to 32-bit
//! protected mode and calls `bootmain`, which uses
//! this crate to pull the kernel's ELF image off the disk and jump to it.
//!
//! No allocator, no console and no error channel exist yet: a failed load
//! returns to the stub, which idles.
//!
//! - [`disk`]: one-sector reads, polling ATA PIO on the machine.
//! - [`elf`]: ELF32 header and program header parsing.
//! - [`memory`]: the physical memory the image lands in.
//! - [`loader`]: the load loop.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod disk;
pub mod elf;
pub mod loader;
pub mod memory;

pub use loader::{LoadError, LoaderConfig, SectorRange, SegmentPolicy, load_image, read_segment};
