//! # Panic and warning reports
//!
//! Fatal conditions end in the panic handler, which prints one line
//!
//! ```text
//! Kernel panic at <file>:<line>: <message>
//! ```
//!
//! and halts. A panic raised while that report is being produced (the
//! formatter itself faulting, say) skips the report and halts directly;
//! [`PanicLatch`] decides which case applies.
//!
//! Non-fatal conditions go through [`kernel_warn!`](crate::kernel_warn),
//! which logs `Kernel warning at <file>:<line>: <message>` at `warn` level.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

/// One-shot latch recording that a panic report is in progress.
pub struct PanicLatch {
    panicking: AtomicBool,
}

impl PanicLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            panicking: AtomicBool::new(false),
        }
    }

    /// Mark a panic as started. Returns `true` for the first caller only;
    /// everyone after that must halt without reporting.
    #[must_use]
    pub fn enter(&self) -> bool {
        !self.panicking.swap(true, Ordering::AcqRel)
    }
}

impl Default for PanicLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// The kernel-wide latch used by the panic handler.
pub static PANIC_LATCH: PanicLatch = PanicLatch::new();

/// `Kernel panic at <file>:<line>: <message>`.
pub struct FaultReport<'a, M: fmt::Display> {
    pub file: &'a str,
    pub line: u32,
    pub message: M,
}

impl<M: fmt::Display> fmt::Display for FaultReport<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kernel panic at {}:{}: {}", self.file, self.line, self.message)
    }
}

/// Log a non-fatal kernel warning attributed to `file:line`.
pub fn warn_at(file: &str, line: u32, args: fmt::Arguments<'_>) {
    log::warn!("Kernel warning at {file}:{line}: {args}");
}

/// Report a non-fatal condition with the caller's source location.
#[macro_export]
macro_rules! kernel_warn {
    ($($arg:tt)*) => {
        $crate::fault::warn_at(core::file!(), core::line!(), core::format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_format() {
        let report = FaultReport {
            file: "kern/pmap.rs",
            line: 42,
            message: format_args!("double free of {}", 7),
        };
        assert_eq!(report.to_string(), "Kernel panic at kern/pmap.rs:42: double free of 7");
    }

    #[test]
    fn latch_admits_only_the_first_panic() {
        let latch = PanicLatch::new();
        assert!(latch.enter());
        assert!(!latch.enter());
        assert!(!latch.enter());
    }
}
