//! # Typed IA-32 Control Registers
//!
//! Bitfield models of the control registers the memory core touches while
//! switching paging on. Reading and writing the hardware registers is only
//! compiled in with the `asm` feature on a 32-bit x86 target; the types
//! themselves are plain values and usable (and testable) everywhere.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr3")]
pub mod cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
