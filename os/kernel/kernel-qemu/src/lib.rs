//! # QEMU debug console output
//!
//! Early-boot and diagnostic output for the kernel when it runs under QEMU.
//! Every byte written to I/O port `0x402` shows up on the host side of
//! QEMU's debug console:
//!
//! ```bash
//! qemu-system-i386 -hda kernel.img -debugcon stdio
//! ```
//!
//! Two ways in:
//!
//! - [`QemuLogger`], a `log::Log` backend. The kernel installs it before
//!   touching memory so that RAM detection, frame-table setup and the paging
//!   switch are all traced.
//! - [`qemu_trace!`], a `format_args!`-style macro that writes straight to the
//!   port. Usable before the logger exists, and from the panic path.
//!
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::{LevelFilter, info};
//!
//! QemuLogger::init(LevelFilter::Debug).expect("logger initialization");
//! info!("frame table ready");
//! ```
//!
//! ## Features
//!
//! `enabled` (default) compiles the port writes in. Without it every output
//! path is a no-op, so release images carry no port I/O. The port write is
//! also a no-op outside a bare-metal x86 target, which keeps the crate
//! usable from host-side tests.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// Whether bytes actually reach the port in this build.
    const LIVE: bool = cfg!(all(
        feature = "enabled",
        any(target_arch = "x86", target_arch = "x86_64"),
        target_os = "none"
    ));

    /// Write one byte to QEMU's debug console port `0x402`.
    #[inline]
    pub fn dbg_putc(c: u8) {
        if !LIVE {
            return;
        }
        #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_os = "none"))]
        // SAFETY: port 0x402 is QEMU's debug console; writes have no other effect.
        unsafe {
            core::arch::asm!("out dx, al", in("dx") 0x402_u16, in("al") c, options(nomem, nostack, preserves_flags));
        }
        #[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), target_os = "none")))]
        let _ = c;
    }

    /// `fmt::Write` adapter over the debug port.
    pub struct QemuSink;

    impl Write for QemuSink {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if LIVE {
                s.bytes().for_each(dbg_putc);
            }
            Ok(())
        }
    }

    pub fn qemu_write(args: fmt::Arguments) {
        if LIVE {
            // The sink never fails.
            let _ = fmt::write(&mut QemuSink, args);
        }
    }
}

/// Write formatted text straight to the QEMU debug port.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
