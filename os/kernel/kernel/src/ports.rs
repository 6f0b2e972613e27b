//! # x86 I/O Port Access
//!
//! Byte-wide wrappers around `in`/`out` for the legacy I/O port space.
//! The kernel only talks to the CMOS/RTC pair here:
//!
//! ```text
//! 0x0070   CMOS/RTC index register (write the register number)
//! 0x0071   CMOS/RTC data register (read the selected register)
//! ```
//!
//! Port I/O is **not** a memory fence; callers that need ordering with
//! normal memory must add their own.

/// Write one byte to an I/O port.
///
/// # Safety
/// - Execute at CPL0 or with I/O permission for `port`, otherwise `#GP`.
/// - `port` must belong to the intended device, and the write must be valid
///   for the device's current state.
/// - Multi-step device protocols must not be interleaved with other users of
///   the same ports.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port.
///
/// # Safety
/// Same requirements as [`outb`]; reading a status or data register can have
/// side effects on the device.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let mut v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}
