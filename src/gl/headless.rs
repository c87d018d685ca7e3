//! Recording GL backend for host-side runs.
//!
//! Shaders "compile" unless they contain an `#error` directive, programs
//! "link" unless a stage lacks `main`, and every uniform write is kept so
//! callers can read back what the GPU would have received.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use super::{Canvas, ContextKind, GlContext, ShaderStage};
use crate::geometry::extract_shader_uniforms;
use crate::value::UniformValue;

#[derive(Debug, Default)]
struct GlRecord {
    next_handle: u32,
    shaders: BTreeMap<u32, String>,
    programs: BTreeMap<u32, BTreeSet<String>>,
    buffers: BTreeSet<u32>,
    uniforms: BTreeMap<(u32, String), UniformValue>,
    current_program: Option<u32>,
    bound_quad: Option<(u32, u32)>,
    optimized_out: BTreeSet<String>,
    configured: Option<(u32, u32)>,
    context_kind: Option<ContextKind>,
    draw_calls: usize,
    fail_draws: bool,
}

impl GlRecord {
    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[derive(Debug)]
pub struct HeadlessShader(u32);

#[derive(Debug)]
pub struct HeadlessProgram(u32);

#[derive(Debug)]
pub struct HeadlessBuffer(u32);

#[derive(Debug, Clone)]
pub struct HeadlessLocation {
    program: u32,
    name: String,
}

pub struct HeadlessGl {
    record: Rc<RefCell<GlRecord>>,
}

impl GlContext for HeadlessGl {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;
    type Location = HeadlessLocation;

    fn configure(&self, width: u32, height: u32) {
        self.record.borrow_mut().configured = Some((width, height));
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String> {
        if let Some(line) = source.lines().find(|line| line.trim_start().starts_with("#error")) {
            return Err(format!("ERROR: 0:1: '{}' : {} shader", line.trim(), stage));
        }
        let mut record = self.record.borrow_mut();
        let handle = record.handle();
        record.shaders.insert(handle, source.to_string());
        Ok(HeadlessShader(handle))
    }

    fn delete_shader(&self, shader: Self::Shader) {
        self.record.borrow_mut().shaders.remove(&shader.0);
    }

    fn link_program(&self, vertex: &Self::Shader, fragment: &Self::Shader) -> Result<Self::Program, String> {
        let mut record = self.record.borrow_mut();
        let mut active = BTreeSet::new();
        for shader in [vertex.0, fragment.0] {
            let source = record
                .shaders
                .get(&shader)
                .ok_or_else(|| "ERROR: attached shader was deleted".to_string())?;
            if !source.contains("void main") {
                return Err("ERROR: Missing main()".to_string());
            }
            active.extend(extract_shader_uniforms(source).into_keys());
        }
        active.retain(|name| !record.optimized_out.contains(name));
        let handle = record.handle();
        record.programs.insert(handle, active);
        Ok(HeadlessProgram(handle))
    }

    fn delete_program(&self, program: Self::Program) {
        let mut record = self.record.borrow_mut();
        record.programs.remove(&program.0);
        record.uniforms.retain(|(p, _), _| *p != program.0);
        if record.current_program == Some(program.0) {
            record.current_program = None;
        }
    }

    fn create_vertex_buffer(&self, data: &[f32]) -> Option<Self::Buffer> {
        if data.is_empty() {
            return None;
        }
        let mut record = self.record.borrow_mut();
        let handle = record.handle();
        record.buffers.insert(handle);
        Some(HeadlessBuffer(handle))
    }

    fn create_index_buffer(&self, data: &[u16]) -> Option<Self::Buffer> {
        if data.is_empty() {
            return None;
        }
        let mut record = self.record.borrow_mut();
        let handle = record.handle();
        record.buffers.insert(handle);
        Some(HeadlessBuffer(handle))
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        self.record.borrow_mut().buffers.remove(&buffer.0);
    }

    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::Location> {
        let record = self.record.borrow();
        record
            .programs
            .get(&program.0)
            .filter(|active| active.contains(name))
            .map(|_| HeadlessLocation {
                program: program.0,
                name: name.to_string(),
            })
    }

    fn begin_draw(&self, program: &Self::Program, _width: u32, _height: u32) {
        self.record.borrow_mut().current_program = Some(program.0);
    }

    fn uniform1f(&self, location: &Self::Location, value: f32) {
        self.record
            .borrow_mut()
            .uniforms
            .insert((location.program, location.name.clone()), UniformValue::Scalar(value));
    }

    fn uniform_fv(&self, location: &Self::Location, values: &[f32]) {
        self.record
            .borrow_mut()
            .uniforms
            .insert((location.program, location.name.clone()), UniformValue::Vector(values.to_vec()));
    }

    fn bind_quad(&self, _program: &Self::Program, vertices: &Self::Buffer, indices: &Self::Buffer) {
        self.record.borrow_mut().bound_quad = Some((vertices.0, indices.0));
    }

    fn draw_indexed(&self, count: i32) -> Result<(), String> {
        let mut record = self.record.borrow_mut();
        if record.fail_draws {
            return Err("CONTEXT_LOST_WEBGL".to_string());
        }
        if record.current_program.is_none() || record.bound_quad.is_none() {
            return Err("INVALID_OPERATION: drawElements: no program or buffers bound".to_string());
        }
        if count <= 0 {
            return Err(format!("INVALID_VALUE: drawElements: count {}", count));
        }
        record.draw_calls += 1;
        Ok(())
    }
}

/// In-memory canvas. Supports both context kinds unless told otherwise.
pub struct HeadlessCanvas {
    id: Option<String>,
    size: (u32, u32),
    kinds: Vec<ContextKind>,
    record: Rc<RefCell<GlRecord>>,
}

impl HeadlessCanvas {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: Some(id.into()),
            size: (width, height),
            kinds: ContextKind::PREFERENCE.to_vec(),
            record: Rc::default(),
        }
    }

    /// Canvas without an `id` attribute.
    pub fn anonymous(width: u32, height: u32) -> Self {
        Self {
            id: None,
            ..Self::new("", width, height)
        }
    }

    pub fn with_contexts(mut self, kinds: &[ContextKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    /// Read-only view of everything the canvas' context has recorded.
    pub fn probe(&self) -> GlProbe {
        GlProbe {
            record: self.record.clone(),
        }
    }
}

impl Canvas for HeadlessCanvas {
    type Gl = HeadlessGl;

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn context(&self, kind: ContextKind) -> Option<Self::Gl> {
        if !self.kinds.contains(&kind) {
            return None;
        }
        self.record.borrow_mut().context_kind = Some(kind);
        Some(HeadlessGl {
            record: self.record.clone(),
        })
    }
}

/// Inspection handle for a [`HeadlessCanvas`].
#[derive(Clone)]
pub struct GlProbe {
    record: Rc<RefCell<GlRecord>>,
}

impl GlProbe {
    /// Last value written to `name` in the program used by the latest draw.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        let record = self.record.borrow();
        let program = record.current_program?;
        record.uniforms.get(&(program, name.to_string())).cloned()
    }

    pub fn live_programs(&self) -> usize {
        self.record.borrow().programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.record.borrow().buffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.record.borrow().shaders.len()
    }

    pub fn draw_calls(&self) -> usize {
        self.record.borrow().draw_calls
    }

    pub fn context_kind(&self) -> Option<ContextKind> {
        self.record.borrow().context_kind
    }

    pub fn configured_size(&self) -> Option<(u32, u32)> {
        self.record.borrow().configured
    }

    /// Makes every following draw call fail, like a lost context.
    pub fn fail_draws(&self, fail: bool) {
        self.record.borrow_mut().fail_draws = fail;
    }

    /// Programs linked after this call report `name` as inactive.
    pub fn optimize_out(&self, name: &str) {
        self.record.borrow_mut().optimized_out.insert(name.to_string());
    }
}
