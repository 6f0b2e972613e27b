//! Physical memory sizing from the CMOS NVRAM.

use crate::cmos::{NVRAM_BASELO, NVRAM_EXT16LO, NVRAM_EXTLO, Nvram};
use kernel_info::memory::{EXTPHYSMEM, PGSIZE, REMAP_WINDOW_SIZE};
use kernel_memory_addresses::PhysicalAddress;

/// KiB between 1 MiB and 16 MiB, the most `0x17`/`0x18` can describe once
/// the `0x34`/`0x35` counter is in use.
const EXT_BELOW_16M_KB: u32 = 15 * 1024;

/// How much physical memory the machine has, as reported by the BIOS.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryGeometry {
    /// Bytes of base memory, page aligned.
    pub basemem: u32,
    /// Bytes of extended memory above 1 MiB, page aligned.
    pub extmem: u32,
    /// One past the highest physical address.
    pub maxpa: PhysicalAddress,
    /// Number of 4 KiB frames below `maxpa`.
    pub total_frames: u32,
}

impl MemoryGeometry {
    /// Build the geometry from the base and extended sizes in KiB.
    ///
    /// The extended block starts at 1 MiB and, when present, defines the top
    /// of memory. Otherwise only base memory exists. Memory the `KERNBASE`
    /// remap window cannot reach is left out.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn from_kilobytes(base_kb: u32, ext_kb: u32) -> Self {
        let basemem = round_down_page(clamp_bytes(base_kb as u64 * 1024, REMAP_WINDOW_SIZE));
        let extmem = round_down_page(clamp_bytes(ext_kb as u64 * 1024, REMAP_WINDOW_SIZE - EXTPHYSMEM));
        let maxpa = if extmem == 0 { basemem } else { EXTPHYSMEM + extmem };
        Self {
            basemem,
            extmem,
            maxpa: PhysicalAddress::new(maxpa),
            total_frames: maxpa / PGSIZE,
        }
    }

    /// Read the memory sizes from `nvram`.
    ///
    /// The extended size is the 16-bit KiB count at `0x17`, or, when the
    /// 64 KiB counter at `0x34` is non-zero, 15 MiB plus that counter.
    pub fn detect(nvram: &mut impl Nvram) -> Self {
        let base_kb = u32::from(nvram.read_u16(NVRAM_BASELO));
        let ext16_64k = u32::from(nvram.read_u16(NVRAM_EXT16LO));
        let ext_kb = if ext16_64k == 0 {
            u32::from(nvram.read_u16(NVRAM_EXTLO))
        } else {
            EXT_BELOW_16M_KB + ext16_64k * 64
        };

        let geometry = Self::from_kilobytes(base_kb, ext_kb);
        if u64::from(geometry.extmem) < (u64::from(ext_kb) * 1024) & !u64::from(PGSIZE - 1) {
            crate::kernel_warn!(
                "ignoring memory above {}: only {}K of {}K extended memory is usable",
                geometry.maxpa,
                geometry.extmem / 1024,
                ext_kb
            );
        }
        log::info!(
            "Physical memory: {}K available, base = {}K, extended = {}K",
            geometry.maxpa.as_u32() / 1024,
            geometry.basemem / 1024,
            geometry.extmem / 1024
        );
        geometry
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
const fn clamp_bytes(bytes: u64, max: u32) -> u32 {
    if bytes > max as u64 { max } else { bytes as u32 }
}

const fn round_down_page(bytes: u32) -> u32 {
    bytes & !(PGSIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmos::tests::FakeNvram;

    #[test]
    fn base_plus_64_mib_extended() {
        let g = MemoryGeometry::from_kilobytes(1024, 64 * 1024);
        assert_eq!(g.basemem, 1024 * 1024);
        assert_eq!(g.extmem, 64 * 1024 * 1024);
        assert_eq!(g.maxpa, PhysicalAddress::new(0x0410_0000));
        assert_eq!(g.total_frames, (1024 * 1024 + 64 * 1024 * 1024) / 4096);
        assert_eq!(g.total_frames, 16640);
    }

    #[test]
    fn detect_combines_the_16_mib_counter() {
        // 15 MiB saturated in 0x17/0x18, 49 MiB as 784 * 64 KiB above 16 MiB.
        let mut nvram = FakeNvram::with_sizes(1024, 15 * 1024, 784);
        let g = MemoryGeometry::detect(&mut nvram);
        assert_eq!(g, MemoryGeometry::from_kilobytes(1024, 64 * 1024));
    }

    #[test]
    fn detect_small_machine_without_the_16_mib_counter() {
        let mut nvram = FakeNvram::with_sizes(640, 7 * 1024, 0);
        let g = MemoryGeometry::detect(&mut nvram);
        assert_eq!(g.maxpa, PhysicalAddress::new(8 * 1024 * 1024));
        assert_eq!(g.total_frames, 2048);
    }

    #[test]
    fn no_extended_memory_uses_base_memory() {
        let g = MemoryGeometry::from_kilobytes(639, 0);
        assert_eq!(g.basemem, 636 * 1024);
        assert_eq!(g.maxpa.as_u32(), 636 * 1024);
        assert_eq!(g.total_frames, 159);
    }

    #[test]
    fn memory_beyond_the_remap_window_is_dropped() {
        // 15 MiB + 0xFFFF * 64 KiB is just short of 4 GiB.
        let mut nvram = FakeNvram::with_sizes(640, 15 * 1024, 0xFFFF);
        let g = MemoryGeometry::detect(&mut nvram);
        assert_eq!(g.maxpa.as_u32(), REMAP_WINDOW_SIZE);
        assert_eq!(g.total_frames, REMAP_WINDOW_SIZE / PGSIZE);
    }

    #[test]
    fn sizes_round_down_to_pages() {
        let g = MemoryGeometry::from_kilobytes(640, 4097);
        assert_eq!(g.extmem, 4096 * 1024);
    }
}
