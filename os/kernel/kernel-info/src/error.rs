//! # Kernel error numbers
//!
//! Stable numbering shared with user space. Functions reporting an error
//! through a plain integer return the negated code.

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorCode {
    /// Unspecified or unknown problem.
    Unspecified = 1,
    /// Environment doesn't exist or otherwise cannot be used.
    BadEnv = 2,
    /// Invalid parameter.
    Invalid = 3,
    /// Request failed due to memory shortage.
    NoMemory = 4,
    /// Attempt to create a new environment beyond the maximum allowed.
    NoFreeEnv = 5,
    /// Memory fault.
    Fault = 6,
}
