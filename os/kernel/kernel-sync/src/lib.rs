//! # Kernel synchronization primitives
//!
//! The memory core runs on a single core without preemption, but its
//! process-wide singletons (the frame allocator, the remap-window translator)
//! still sit behind these two types so that shared access stays explicit:
//!
//! - [`SpinLock`]: test-and-test-and-set lock with an RAII guard.
//! - [`SyncOnceCell`]: write-once cell for values installed during boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod sync_once_cell;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
