//! # Sector Disk Access
//!
//! The loader reads the kernel image one 512-byte sector at a time. On the
//! machine that is the primary ATA channel in PIO mode:
//!
//! ```text
//! 0x1F0   data (read 128 dwords per sector)
//! 0x1F2   sector count
//! 0x1F3   LBA bits 0..7
//! 0x1F4   LBA bits 8..15
//! 0x1F5   LBA bits 16..23
//! 0x1F6   0xE0 | LBA bits 24..27 (LBA mode, master)
//! 0x1F7   command (write) / status (read)
//! ```
//!
//! There is no timeout; a drive that never becomes ready hangs the boot.

use kernel_info::boot::SECTOR_SIZE;

/// One disk sector.
pub type Sector = [u8; SECTOR_SIZE as usize];

/// A disk addressed by logical block (sector) number.
pub trait SectorDisk {
    /// Read sector `lba` into `dst`.
    fn read_sector(&mut self, lba: u32, dst: &mut Sector);
}

/// Polling PIO driver for the primary ATA drive.
#[cfg(target_arch = "x86")]
pub struct AtaPio {
    _private: (),
}

#[cfg(target_arch = "x86")]
impl AtaPio {
    const DATA: u16 = 0x1F0;
    const SECTOR_COUNT: u16 = 0x1F2;
    const LBA_LOW: u16 = 0x1F3;
    const LBA_MID: u16 = 0x1F4;
    const LBA_HIGH: u16 = 0x1F5;
    const DRIVE_HEAD: u16 = 0x1F6;
    const COMMAND: u16 = 0x1F7;
    const STATUS: u16 = 0x1F7;

    const STATUS_BUSY_READY: u8 = 0xC0;
    const STATUS_READY: u8 = 0x40;
    const CMD_READ_SECTORS: u8 = 0x20;

    /// # Safety
    /// Must run at CPL0 (or with I/O permission for `0x1F0..=0x1F7`), and
    /// nothing else may drive the primary ATA channel.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn wait_ready() {
        // SAFETY: reading the status register has no side effects.
        while unsafe { inb(Self::STATUS) } & Self::STATUS_BUSY_READY != Self::STATUS_READY {
            core::hint::spin_loop();
        }
    }
}

#[cfg(target_arch = "x86")]
impl SectorDisk for AtaPio {
    #[allow(clippy::cast_possible_truncation)]
    fn read_sector(&mut self, lba: u32, dst: &mut Sector) {
        Self::wait_ready();
        // SAFETY: exclusive use of the channel is a precondition of `new`.
        unsafe {
            outb(Self::SECTOR_COUNT, 1);
            outb(Self::LBA_LOW, lba as u8);
            outb(Self::LBA_MID, (lba >> 8) as u8);
            outb(Self::LBA_HIGH, (lba >> 16) as u8);
            outb(Self::DRIVE_HEAD, ((lba >> 24) as u8) | 0xE0);
            outb(Self::COMMAND, Self::CMD_READ_SECTORS);
        }

        Self::wait_ready();
        // SAFETY: `dst` is exactly 128 dwords; DF is clear on asm entry.
        unsafe {
            core::arch::asm!(
                "rep insd",
                in("dx") Self::DATA,
                inout("edi") dst.as_mut_ptr() => _,
                inout("ecx") SECTOR_SIZE / 4 => _,
                options(nostack, preserves_flags)
            );
        }
    }
}

/// # Safety
/// CPL0 or I/O permission for `port`.
#[cfg(target_arch = "x86")]
#[inline]
unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// # Safety
/// CPL0 or I/O permission for `port`.
#[cfg(target_arch = "x86")]
#[inline]
unsafe fn inb(port: u16) -> u8 {
    let mut v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A disk image: sector 0 is a boot sector, the kernel image follows.
    pub struct ImageDisk {
        image: Vec<u8>,
        /// Every sector read, in order.
        pub reads: Vec<u32>,
    }

    impl ImageDisk {
        pub fn with_image(image: Vec<u8>) -> Self {
            Self { image, reads: Vec::new() }
        }

        /// The reads grouped into runs of consecutive sectors.
        pub fn runs(&self) -> Vec<(u32, u32)> {
            let mut runs: Vec<(u32, u32)> = Vec::new();
            for &lba in &self.reads {
                match runs.last_mut() {
                    Some((_, last)) if *last + 1 == lba => *last = lba,
                    _ => runs.push((lba, lba)),
                }
            }
            runs
        }
    }

    impl SectorDisk for ImageDisk {
        fn read_sector(&mut self, lba: u32, dst: &mut Sector) {
            self.reads.push(lba);
            dst.fill(0);
            let Some(start) = (lba as usize).checked_sub(1).map(|s| s * dst.len()) else {
                dst.fill(0xB0); // the boot sector; never part of the image
                return;
            };
            if start < self.image.len() {
                let end = (start + dst.len()).min(self.image.len());
                dst[..end - start].copy_from_slice(&self.image[start..end]);
            }
        }
    }

    #[test]
    fn image_starts_at_sector_one() {
        let mut image = vec![0u8; 1024];
        image[0] = 0x11;
        image[512] = 0x22;
        let mut disk = ImageDisk::with_image(image);
        let mut sector = [0u8; 512];

        disk.read_sector(1, &mut sector);
        assert_eq!(sector[0], 0x11);
        disk.read_sector(2, &mut sector);
        assert_eq!(sector[0], 0x22);
        disk.read_sector(9, &mut sector);
        assert!(sector.iter().all(|&b| b == 0));
        assert_eq!(disk.runs(), vec![(1, 2), (9, 9)]);
    }
}
