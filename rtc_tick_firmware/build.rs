use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    // Set default value for OS_TICKS_PER_SEC for convenience in IDE
    if env::var("OS_TICKS_PER_SEC").is_err() {
        println!("cargo:rustc-env=OS_TICKS_PER_SEC=128");
    }
    println!("cargo:rerun-if-env-changed=OS_TICKS_PER_SEC");

    // Put `memory.x` in our output directory and ensure it's on the linker search path.
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(include_bytes!("memory.x"))
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=memory.x");
}
