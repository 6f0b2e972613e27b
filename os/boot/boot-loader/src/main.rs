//! `bootmain`: called by the boot sector's assembly stub in 32-bit protected
//! mode with flat segments. Loads the kernel and jumps to it; returns only if
//! the disk does not hold an ELF image.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![allow(unsafe_code)]

#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod target {
    use boot_loader::disk::AtaPio;
    use boot_loader::memory::IdentityMemory;
    use boot_loader::{LoaderConfig, load_image};
    use core::panic::PanicInfo;
    use kernel_info::boot::KernelEntryFn;

    #[unsafe(no_mangle)]
    pub extern "C" fn bootmain() {
        // SAFETY: CPL0, paging off, and the stub is the only user of the disk.
        let (mut disk, mut memory) = unsafe { (AtaPio::new(), IdentityMemory::new()) };

        let Ok(entry) = load_image(&mut disk, &mut memory, LoaderConfig::default(), |_, _| {}) else {
            return;
        };

        // SAFETY: the image was linked with this entry point, and its
        // segments are now in place.
        let entry: KernelEntryFn = unsafe { core::mem::transmute(entry as usize) };
        unsafe { entry() }
    }

    #[panic_handler]
    fn panic(_info: &PanicInfo) -> ! {
        loop {
            // SAFETY: CPL0; there is nothing to report to.
            unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
        }
    }
}
