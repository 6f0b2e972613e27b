//! # Physical Memory Allocation
//!
//! Frame-level memory management for the kernel:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Frame Allocator                     │
//! │    • alloc / free of 4 KiB frames                   │
//! │    • per-frame reference counts                     │
//! │    • process-wide singleton                         │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Frame Table + Free List                   │
//! │    • one descriptor per physical frame              │
//! │    • intrusive singly linked free list              │
//! │    • exported read-only at UPAGES                   │
//! └─────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────┐
//! │            Kernel Remap Window                      │
//! │    • KERNBASE + pa ⇄ pa, bounds checked             │
//! │    • PhysMapper for page-table edits                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. The bootstrap bump-allocates the descriptor array (one
//!    [`FrameDescriptor`] per detected frame) right after the kernel image.
//! 2. [`FrameAllocator::init`] reserves frame 0, the I/O hole and everything up
//!    to the end of boot allocations, and links the rest in ascending order.
//! 3. The allocator is moved into the global slot with [`global::install`].
//!
//! From then on page tables and mappings are built through
//! [`kernel_vmem::AddressSpace`], which takes and drops references through the
//! [`kernel_vmem::FrameAlloc`] implementation of [`FrameAllocator`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_alloc;
pub mod frame_table;
pub mod global;
pub mod phys_mapper;

pub use frame_alloc::FrameAllocator;
pub use frame_table::{FrameDescriptor, FrameState, FrameTable};
pub use global::{install, teardown, try_with_frame_allocator, with_frame_allocator};
pub use phys_mapper::{KernelPhysMapper, TranslationError};
