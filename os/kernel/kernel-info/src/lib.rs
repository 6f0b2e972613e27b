//! # Kernel Configuration and Layout
//!
//! This crate is the single source of truth for values that the boot loader,
//! the kernel, the linker script and user programs must agree on.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! The 32-bit virtual memory map: page geometry, the kernel remap window at
//! [`KERNBASE`](memory::KERNBASE), the never-mapped guard above
//! [`ULIM`](memory::ULIM), the self-mapped page table windows and the
//! user-visible read-only regions.
//!
//! ### Boot Interface ([`boot`])
//! Disk and load-address conventions of the boot sector loader.
//!
//! ### Error Numbers ([`error`])
//! Numeric error codes returned across the kernel/user boundary.
//!
//! ## Guarantees
//!
//! Every relationship between constants is checked in a `const` block, so a
//! layout edit that breaks an invariant fails to compile rather than at boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod error;
pub mod memory;
