#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

pub mod bus;
pub mod clock;
pub mod config;
pub mod easing;
pub mod error;
pub mod geometry;
pub mod gl;
pub mod interaction;
pub mod navigation;
pub mod pool;
pub mod value;

// Developer CLI, host only.
#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

// Browser bindings, only compiled when targeting wasm32.
#[cfg(target_arch = "wasm32")]
pub mod wasm;
