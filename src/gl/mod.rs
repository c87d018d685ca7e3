//! The GPU seam: everything the pool needs from a canvas and its GL context.
//!
//! The browser implementation lives in `wasm::webgl`; [`headless`] records
//! calls so the pool can run without a GPU.

pub mod headless;

use std::fmt;

use serde::Serialize;

/// Full-screen quad, interleaved `[x, y, u, v]`.
pub const QUAD_VERTICES: [f32; 16] = [
    -1.0, -1.0, 0.0, 0.0, //
    1.0, -1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, 1.0, //
    1.0, 1.0, 1.0, 1.0,
];

/// Two triangles over [`QUAD_VERTICES`].
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 1, 3, 2];

/// Bytes between consecutive quad vertices.
pub const QUAD_STRIDE: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Context identifiers, in the order they are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    WebGl,
    ExperimentalWebGl,
}

impl ContextKind {
    pub const PREFERENCE: [ContextKind; 2] = [ContextKind::WebGl, ContextKind::ExperimentalWebGl];

    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::WebGl => "webgl",
            ContextKind::ExperimentalWebGl => "experimental-webgl",
        }
    }
}

/// Minimal WebGL 1 surface used by the pool.
pub trait GlContext {
    type Shader;
    type Program;
    type Buffer;
    type Location;

    /// Viewport, clear color and alpha blending for a fresh context.
    fn configure(&self, width: u32, height: u32);

    /// Returns the info log on failure.
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;
    fn delete_shader(&self, shader: Self::Shader);

    /// Returns the info log on failure.
    fn link_program(&self, vertex: &Self::Shader, fragment: &Self::Shader) -> Result<Self::Program, String>;
    fn delete_program(&self, program: Self::Program);

    fn create_vertex_buffer(&self, data: &[f32]) -> Option<Self::Buffer>;
    fn create_index_buffer(&self, data: &[u16]) -> Option<Self::Buffer>;
    fn delete_buffer(&self, buffer: Self::Buffer);

    /// `None` when the uniform is not active in the linked program.
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::Location>;

    /// Use the program, set the viewport and clear.
    fn begin_draw(&self, program: &Self::Program, width: u32, height: u32);
    fn uniform1f(&self, location: &Self::Location, value: f32);
    /// `values.len()` is 2, 3 or 4.
    fn uniform_fv(&self, location: &Self::Location, values: &[f32]);
    fn bind_quad(&self, program: &Self::Program, vertices: &Self::Buffer, indices: &Self::Buffer);
    fn draw_indexed(&self, count: i32) -> Result<(), String>;
}

/// A drawing surface that can hand out a GL context.
pub trait Canvas {
    type Gl: GlContext;

    /// Element id, used as the visualizer id.
    fn id(&self) -> Option<String>;
    fn size(&self) -> (u32, u32);
    fn context(&self, kind: ContextKind) -> Option<Self::Gl>;
}
