//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 32-bit addresses, so that physical and
//! linear addresses cannot be mixed up at compile time. Both are zero-cost
//! wrappers around `u32`.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | Physical memory or device regions. |
//! | [`VirtualAddress`] | Linear addresses, translated by the page tables. |
//!
//! Page frames themselves are named by `kernel_vmem::Frame`.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod physical_address;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Bytes in one 4 KiB page.
pub const PAGE_SIZE: u32 = 4096;
