//! # Kernel memory bring-up
//!
//! Everything the kernel does between the boot loader's jump and a running
//! paged address space:
//!
//! 1. [`memory_detect`]: size physical memory from the CMOS NVRAM.
//! 2. [`bootstrap`]: carve the boot page directory and the frame table out
//!    of the memory after the kernel image, start the frame allocator and
//!    build and verify the boot address space.
//! 3. [`paging`]: load CR3 and enable paging.
//! 4. [`gdt`]: switch from the boot segments to flat segments, and load the
//!    TSS.
//!
//! The pieces are target independent where possible so they can be tested
//! on the host against simulated physical memory; the binary in `main.rs`
//! strings them together on the real machine.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod boot_alloc;
pub mod bootstrap;
pub mod cmos;
pub mod error;
pub mod fault;
pub mod gdt;
pub mod memory_detect;
pub mod tss;

#[cfg(target_arch = "x86")]
pub mod paging;
#[cfg(target_arch = "x86")]
pub mod ports;

pub use bootstrap::{BootMemory, BootPlan, build_boot_address_space, init_boot_memory, verify_boot_address_space};
pub use error::BootError;
pub use memory_detect::MemoryGeometry;
