use kernel_info::memory;
use std::{env, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let ld = manifest_dir.join("kernel.ld");

    // Sanity checks (fail fast during build)
    let kernbase = memory::KERNBASE;
    let load_phys = memory::KERNEL_LOAD_PHYS;
    assert_eq!(
        kernbase & (memory::PTSIZE - 1),
        0,
        "KERNBASE must be 4 MiB aligned (got {kernbase:#x})"
    );
    assert_eq!(
        load_phys & (memory::PGSIZE - 1),
        0,
        "KERNEL_LOAD_PHYS must be 4 KiB aligned (got {load_phys:#x})"
    );
    assert!(
        load_phys >= memory::EXTPHYSMEM,
        "the kernel must load above the I/O hole (got {load_phys:#x})"
    );

    println!("cargo:rerun-if-changed={}", ld.display());
    println!("cargo:rerun-if-env-changed=KERNEL_LOG_LEVEL");

    // Hosted builds are only the test stub; no custom layout.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    println!("cargo:rustc-link-arg-bins=--defsym=KERNBASE={kernbase:#x}");
    println!("cargo:rustc-link-arg-bins=--defsym=KERNEL_LOAD_PHYS={load_phys:#x}");
}
