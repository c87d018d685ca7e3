// Copies the static site into `dist/`. The wasm bundle itself is built by
// `hyperviz serve` (wasm-pack), which drops it into static/pkg.
use std::{fs, path::Path};

use fs_extra::dir::CopyOptions;

fn main() {
    println!("cargo:rerun-if-changed=static");

    let static_dir = Path::new("static");
    if !static_dir.exists() {
        return;
    }
    let out_dir = Path::new("dist");
    if out_dir.exists() {
        if let Err(e) = fs::remove_dir_all(out_dir) {
            println!("cargo:warning=could not clear dist/: {}", e);
        }
    }
    if let Err(e) = fs::create_dir_all(out_dir) {
        println!("cargo:warning=could not create dist/: {}", e);
        return;
    }

    let mut options = CopyOptions::new();
    options.content_only = true;
    options.overwrite = true;
    if let Err(e) = fs_extra::dir::copy(static_dir, out_dir, &options) {
        println!("cargo:warning=copying static/ to dist/ failed: {}", e);
    }
}
