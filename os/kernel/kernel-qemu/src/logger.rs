use crate::qemu_trace;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing `"[LEVEL] target: message\n"` lines to the QEMU
/// debug port. Filtering uses the global `log::max_level()`.
pub struct QemuLogger;

static LOGGER: QemuLogger = QemuLogger;

impl QemuLogger {
    /// Install the logger and set the global level. Call once, early.
    ///
    /// # Errors
    /// Fails if any logger was installed before.
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

/// `[LEVEL] target: message`, without the newline.
struct Line<'a, 'r>(&'a Record<'r>);

impl fmt::Display for Line<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.0.level(), self.0.target(), self.0.args())
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        qemu_trace!("{}\n", Line(record));
    }

    fn flush(&self) {}
}
