//! # Kernel Entry Point
//!
//! The boot loader jumps to `_start` at its physical load address with
//! paging off and flat segments. `_start` loads a provisional GDT whose
//! segments are based at `-KERNBASE`, so the kernel's link addresses
//! (`KERNBASE + pa`) reach physical memory before any page table exists.
//! [`kernel_entry`](target::kernel_entry) then builds the boot address
//! space, enables paging, switches to flat segments and drops the
//! temporary low alias.
//!
//! On a hosted target the binary is an empty stub so the workspace builds
//! and tests everywhere.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![allow(unsafe_code)]

#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod target {
    use core::panic::PanicInfo;
    use kernel::bootstrap::{BootMemory, BootPlan, drop_low_alias};
    use kernel::cmos::CmosNvram;
    use kernel::fault::{FaultReport, PANIC_LATCH};
    use kernel::gdt::descriptors::{STA_R, STA_W, STA_X, SegmentDescriptor};
    use kernel::gdt::{self, GD_KD, GD_KT, Gdt};
    use kernel::tss::TaskState;
    use kernel::{BootError, MemoryGeometry, paging};
    use kernel_alloc::{KernelPhysMapper, install_phys_mapper, phys_mapper};
    use kernel_info::memory::{KERNBASE, KSTKSIZE};
    use kernel_memory_addresses::PhysicalAddress;
    use kernel_qemu::{QemuLogger, qemu_trace};
    use kernel_sync::SyncOnceCell;
    use kernel_vmem::Invlpg;
    use log::LevelFilter;

    /// Provisional code segment: linear = virtual - KERNBASE.
    const BOOT_CODE: SegmentDescriptor = SegmentDescriptor::segment(STA_X | STA_R, 0u32.wrapping_sub(KERNBASE), 0xFFFF_FFFF, 0);

    /// Provisional data segment, same base as [`BOOT_CODE`].
    const BOOT_DATA: SegmentDescriptor = SegmentDescriptor::segment(STA_W, 0u32.wrapping_sub(KERNBASE), 0xFFFF_FFFF, 0);

    /// The boot kernel stack, mapped again below `KSTACKTOP`.
    #[repr(C, align(4096))]
    struct KernelStack([u8; KSTKSIZE as usize]);

    #[unsafe(no_mangle)]
    static mut BOOT_STACK: KernelStack = KernelStack([0; KSTKSIZE as usize]);

    unsafe extern "C" {
        /// End of the kernel image, from the linker script.
        static end: u8;
    }

    static TSS: TaskState = gdt::boot_task_state();
    static GDT: SyncOnceCell<Gdt> = SyncOnceCell::new();

    /// Physical address of a kernel-image symbol.
    fn physical<T>(ptr: *const T) -> PhysicalAddress {
        PhysicalAddress::new((ptr as u32).wrapping_sub(KERNBASE))
    }

    #[unsafe(no_mangle)]
    #[unsafe(naked)]
    pub extern "C" fn _start() -> ! {
        core::arch::naked_asm!(
            "cli",
            "cld",
            // Segments based at -KERNBASE; until paging is on, the link
            // address of everything is KERNBASE above where it was loaded.
            "lgdt [4f - {kernbase}]",
            "mov ax, {kd}",
            "mov ds, ax",
            "mov es, ax",
            "mov ss, ax",
            "mov fs, ax",
            "mov gs, ax",
            "lea esp, [{stack} + {stack_size}]",
            "push {kt}",
            "lea eax, [2f]",
            "push eax",
            "retf",
            "2:",
            "xor ebp, ebp",
            "call {entry}",
            "5:",
            "hlt",
            "jmp 5b",
            ".p2align 3",
            "3:",
            ".quad 0",
            ".quad {boot_code}",
            ".quad {boot_data}",
            "4:",
            ".short 4b - 3b - 1",
            ".long 3b - {kernbase}",
            kernbase = const KERNBASE,
            kd = const GD_KD.encode(),
            kt = const GD_KT.encode(),
            stack = sym BOOT_STACK,
            stack_size = const KSTKSIZE,
            entry = sym kernel_entry,
            boot_code = const BOOT_CODE.into_bits(),
            boot_data = const BOOT_DATA.into_bits(),
        );
    }

    #[unsafe(no_mangle)]
    extern "C" fn kernel_entry() -> ! {
        if QemuLogger::init(LevelFilter::Debug).is_err() {
            qemu_trace!("logger already installed\n");
        }
        log::info!("kernel entered");

        if let Err(e) = bring_up_memory() {
            panic!("memory bring-up failed: {e} ({:?})", e.code());
        }

        log::info!(
            "memory core ready, {} frames free",
            kernel_alloc::with_frame_allocator(|a| a.free_count())
        );
        halt_forever()
    }

    fn bring_up_memory() -> Result<(), BootError> {
        // SAFETY: single CPU at CPL0, nobody else drives the RTC ports.
        let geometry = MemoryGeometry::detect(&mut unsafe { CmosNvram::new() });
        if install_phys_mapper(KernelPhysMapper::new(geometry.total_frames)).is_err() {
            panic!("physical mapper installed twice");
        }
        let Some(mapper) = phys_mapper() else {
            panic!("physical mapper missing after install");
        };

        let plan = BootPlan {
            geometry,
            kernel_end: physical(&raw const end),
            kernel_stack: physical(&raw const BOOT_STACK),
        };

        // SAFETY: memory past the kernel image is unused, and the
        // provisional segments make `KERNBASE + pa` reach it.
        let mut memory: BootMemory<'static> = unsafe { kernel::init_boot_memory(mapper, &plan)? };
        let tlb = Invlpg;
        let mut space = kernel::build_boot_address_space(mapper, &tlb, &mut memory, &plan)?;
        kernel::verify_boot_address_space(&space, &memory, &plan)?;

        // SAFETY: the low alias maps the segment-translated addresses of the
        // running code and stack.
        unsafe { paging::enable_paging(memory.directory) };
        log::debug!("paging enabled");

        let gdt = GDT.get_or_init(|| Gdt::new(core::ptr::from_ref(&TSS) as u32));
        // SAFETY: interrupts are off, and both statics live forever.
        unsafe { gdt::load(gdt) };

        drop_low_alias(&mut space);
        // SAFETY: flat segments now use the KERNBASE window only.
        unsafe { paging::flush_tlb() };

        let BootMemory { allocator, .. } = memory;
        if kernel_alloc::install(allocator).is_err() {
            panic!("frame allocator installed twice");
        }
        Ok(())
    }

    fn halt_forever() -> ! {
        loop {
            // SAFETY: CPL0; nothing is left to run.
            unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        if PANIC_LATCH.enter() {
            let (file, line) = info.location().map_or(("<unknown>", 0), |l| (l.file(), l.line()));
            qemu_trace!(
                "{}\n",
                FaultReport {
                    file,
                    line,
                    message: info.message()
                }
            );
        }
        halt_forever()
    }
}
