//! WebGL 1 implementation of the GL seam.

use wasm_bindgen::JsCast;
use web_sys::{
    HtmlCanvasElement, WebGlBuffer, WebGlProgram, WebGlRenderingContext as GL, WebGlShader, WebGlUniformLocation,
};

use crate::gl::{Canvas, ContextKind, GlContext, ShaderStage, QUAD_STRIDE};

/// Upper bound on queued errors read before a draw; a lost context can keep reporting.
const MAX_PENDING_ERRORS: usize = 8;

pub struct WebCanvas {
    element: HtmlCanvasElement,
}

impl WebCanvas {
    pub fn new(element: HtmlCanvasElement) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &HtmlCanvasElement {
        &self.element
    }
}

impl Canvas for WebCanvas {
    type Gl = WebGl;

    fn id(&self) -> Option<String> {
        let id = self.element.id();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.element.width(), self.element.height())
    }

    fn context(&self, kind: ContextKind) -> Option<Self::Gl> {
        let context = self.element.get_context(kind.as_str()).ok()??;
        context.dyn_into::<GL>().ok().map(|gl| WebGl { gl })
    }
}

pub struct WebGl {
    gl: GL,
}

impl WebGl {
    fn attribute(&self, program: &WebGlProgram, name: &str) -> Option<u32> {
        u32::try_from(self.gl.get_attrib_location(program, name)).ok()
    }
}

impl GlContext for WebGl {
    type Shader = WebGlShader;
    type Program = WebGlProgram;
    type Buffer = WebGlBuffer;
    type Location = WebGlUniformLocation;

    fn configure(&self, width: u32, height: u32) {
        let gl = &self.gl;
        gl.viewport(0, 0, width as i32, height as i32);
        gl.clear_color(0.0, 0.0, 0.0, 0.0);
        gl.enable(GL::BLEND);
        gl.blend_func(GL::SRC_ALPHA, GL::ONE_MINUS_SRC_ALPHA);
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String> {
        let kind = match stage {
            ShaderStage::Vertex => GL::VERTEX_SHADER,
            ShaderStage::Fragment => GL::FRAGMENT_SHADER,
        };
        let shader = self
            .gl
            .create_shader(kind)
            .ok_or_else(|| format!("Unable to create {} shader object", stage))?;
        self.gl.shader_source(&shader, source);
        self.gl.compile_shader(&shader);

        let compiled = self
            .gl
            .get_shader_parameter(&shader, GL::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false);
        if compiled {
            return Ok(shader);
        }
        let log = self
            .gl
            .get_shader_info_log(&shader)
            .unwrap_or_else(|| "Unknown error".to_string());
        self.gl.delete_shader(Some(&shader));
        Err(log)
    }

    fn delete_shader(&self, shader: Self::Shader) {
        self.gl.delete_shader(Some(&shader));
    }

    fn link_program(&self, vertex: &Self::Shader, fragment: &Self::Shader) -> Result<Self::Program, String> {
        let program = self
            .gl
            .create_program()
            .ok_or_else(|| "Unable to create program object".to_string())?;
        self.gl.attach_shader(&program, vertex);
        self.gl.attach_shader(&program, fragment);
        self.gl.link_program(&program);

        let linked = self
            .gl
            .get_program_parameter(&program, GL::LINK_STATUS)
            .as_bool()
            .unwrap_or(false);
        if linked {
            return Ok(program);
        }
        let log = self
            .gl
            .get_program_info_log(&program)
            .unwrap_or_else(|| "Unknown error".to_string());
        self.gl.delete_program(Some(&program));
        Err(log)
    }

    fn delete_program(&self, program: Self::Program) {
        self.gl.delete_program(Some(&program));
    }

    fn create_vertex_buffer(&self, data: &[f32]) -> Option<Self::Buffer> {
        let buffer = self.gl.create_buffer()?;
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(&buffer));
        // The view aliases wasm memory; nothing allocates until the upload returns.
        unsafe {
            let array = js_sys::Float32Array::view(data);
            self.gl
                .buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &array, GL::STATIC_DRAW);
        }
        Some(buffer)
    }

    fn create_index_buffer(&self, data: &[u16]) -> Option<Self::Buffer> {
        let buffer = self.gl.create_buffer()?;
        self.gl.bind_buffer(GL::ELEMENT_ARRAY_BUFFER, Some(&buffer));
        unsafe {
            let array = js_sys::Uint16Array::view(data);
            self.gl
                .buffer_data_with_array_buffer_view(GL::ELEMENT_ARRAY_BUFFER, &array, GL::STATIC_DRAW);
        }
        Some(buffer)
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        self.gl.delete_buffer(Some(&buffer));
    }

    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::Location> {
        self.gl.get_uniform_location(program, name)
    }

    fn begin_draw(&self, program: &Self::Program, width: u32, height: u32) {
        self.gl.use_program(Some(program));
        self.gl.viewport(0, 0, width as i32, height as i32);
        self.gl.clear(GL::COLOR_BUFFER_BIT);
    }

    fn uniform1f(&self, location: &Self::Location, value: f32) {
        self.gl.uniform1f(Some(location), value);
    }

    fn uniform_fv(&self, location: &Self::Location, values: &[f32]) {
        match values.len() {
            2 => self.gl.uniform2fv_with_f32_array(Some(location), values),
            3 => self.gl.uniform3fv_with_f32_array(Some(location), values),
            4 => self.gl.uniform4fv_with_f32_array(Some(location), values),
            _ => {}
        }
    }

    fn bind_quad(&self, program: &Self::Program, vertices: &Self::Buffer, indices: &Self::Buffer) {
        let gl = &self.gl;
        gl.bind_buffer(GL::ARRAY_BUFFER, Some(vertices));
        if let Some(position) = self.attribute(program, "a_position") {
            gl.enable_vertex_attrib_array(position);
            gl.vertex_attrib_pointer_with_i32(position, 2, GL::FLOAT, false, QUAD_STRIDE, 0);
        }
        if let Some(tex_coord) = self.attribute(program, "a_texCoord") {
            gl.enable_vertex_attrib_array(tex_coord);
            gl.vertex_attrib_pointer_with_i32(tex_coord, 2, GL::FLOAT, false, QUAD_STRIDE, 8);
        }
        gl.bind_buffer(GL::ELEMENT_ARRAY_BUFFER, Some(indices));
    }

    fn draw_indexed(&self, count: i32) -> Result<(), String> {
        if self.gl.is_context_lost() {
            return Err("WebGL context lost".to_string());
        }
        // Uniform upload errors stay queued until read; only the draw's own
        // error should count against the visualizer.
        for _ in 0..MAX_PENDING_ERRORS {
            match self.gl.get_error() {
                GL::NO_ERROR => break,
                code => log::debug!("Discarding pending GL error 0x{:04x}", code),
            }
        }
        self.gl.draw_elements_with_i32(GL::TRIANGLES, count, GL::UNSIGNED_SHORT, 0);
        match self.gl.get_error() {
            GL::NO_ERROR => Ok(()),
            code => Err(format!("drawElements failed with GL error 0x{:04x}", code)),
        }
    }
}
