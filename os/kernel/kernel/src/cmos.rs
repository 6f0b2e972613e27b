//! # CMOS NVRAM
//!
//! The RTC chip keeps a small battery-backed NVRAM. The BIOS stores the
//! installed memory sizes there in KiB, as little-endian 16-bit values
//! split across two registers each:
//!
//! | Register | Meaning |
//! |---|---|
//! | `0x15`/`0x16` | base memory (below 640 KiB) |
//! | `0x17`/`0x18` | extended memory (above 1 MiB, saturates below 16 MiB) |
//! | `0x34`/`0x35` | memory above 16 MiB, in 64 KiB units |
//!
//! A register is read by writing its number to the index port `0x70` and
//! then reading the data port `0x71`.

/// CMOS/RTC index port. The data port is `IO_RTC + 1`.
pub const IO_RTC: u16 = 0x70;

/// Base memory size in KiB, low byte; the high byte follows.
pub const NVRAM_BASELO: u8 = 0x15;

/// Extended memory size in KiB, low byte; the high byte follows.
pub const NVRAM_EXTLO: u8 = 0x17;

/// Memory above 16 MiB in 64 KiB units, low byte; the high byte follows.
pub const NVRAM_EXT16LO: u8 = 0x34;

/// Byte-addressed access to the NVRAM registers.
pub trait Nvram {
    /// Read the single register `reg`.
    fn read(&mut self, reg: u8) -> u8;

    /// Read the 16-bit value stored in `reg` (low byte) and `reg + 1`.
    fn read_u16(&mut self, reg: u8) -> u16 {
        let lo = self.read(reg);
        let hi = self.read(reg + 1);
        u16::from_le_bytes([lo, hi])
    }
}

/// The real CMOS behind ports `0x70`/`0x71`.
#[cfg(target_arch = "x86")]
pub struct CmosNvram {
    _private: (),
}

#[cfg(target_arch = "x86")]
impl CmosNvram {
    /// Claim the CMOS ports.
    ///
    /// # Safety
    /// Must run at CPL0, and nothing else may drive the RTC index port while
    /// the handle is in use.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86")]
impl Nvram for CmosNvram {
    fn read(&mut self, reg: u8) -> u8 {
        use crate::ports::{inb, outb};

        // SAFETY: `new` established exclusive CPL0 access to the RTC ports.
        unsafe {
            outb(IO_RTC, reg);
            inb(IO_RTC + 1)
        }
    }
}
