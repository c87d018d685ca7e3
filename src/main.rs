//! Host-side helper: validate configuration, simulate a session headlessly,
//! or build the wasm site and serve it locally.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(e) = hyperviz_wasm::cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
