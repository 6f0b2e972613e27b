use std::env;

fn main() {
    // Hosted builds are only the test stub; the boot sector stub calls in.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }
    println!("cargo:rustc-link-arg-bins=--entry=bootmain");
}
