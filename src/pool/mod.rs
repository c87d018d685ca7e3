//! Owns every visualizer's GL context, program and buffers and drives them
//! from a single render loop.

mod animation;

use std::collections::BTreeMap;
use std::rc::Rc;

pub use animation::{AnimationSlots, AnimationStep, UniformAnimationTask};

use crate::bus::{Event, EventBus, Mailbox, Topic};
use crate::easing::Curve;
use crate::error::VisualizerError;
use crate::geometry::{contract_spec, CompiledShader, GeometryRegistry, FRAGMENT_UNIFORMS};
use crate::gl::{Canvas, ContextKind, GlContext, ShaderStage, QUAD_INDICES, QUAD_VERTICES};
use crate::value::{UniformValue, ValueDescriptor};

type Gl<C> = <C as Canvas>::Gl;
type Program<C> = <Gl<C> as GlContext>::Program;
type Buffer<C> = <Gl<C> as GlContext>::Buffer;
type Location<C> = <Gl<C> as GlContext>::Location;

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Visualizer whose geometry follows `BackgroundGeometryChanged`.
    pub background_visualizer: Option<String>,
    /// Transition applied when a master parameter changes.
    pub master_transition_ms: f64,
    pub master_transition_curve: Curve,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            background_visualizer: None,
            master_transition_ms: 800.0,
            master_transition_curve: Curve::EaseInOut,
        }
    }
}

/// One canvas with its context, program and live parameter state.
pub struct Visualizer<C: Canvas> {
    id: String,
    canvas: C,
    gl: Gl<C>,
    program: Program<C>,
    vertex_buffer: Buffer<C>,
    index_buffer: Buffer<C>,
    geometry: String,
    uniform_locations: BTreeMap<String, Location<C>>,
    parameters: BTreeMap<String, UniformValue>,
    is_active: bool,
    last_render_time: f32,
}

impl<C: Canvas> Visualizer<C> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn geometry(&self) -> &str {
        &self.geometry
    }

    pub fn parameter(&self, name: &str) -> Option<&UniformValue> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, UniformValue> {
        &self.parameters
    }

    /// Uniform names with a bound GL location.
    pub fn bound_uniforms(&self) -> impl Iterator<Item = &str> {
        self.uniform_locations.keys().map(String::as_str)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn last_render_time(&self) -> f32 {
        self.last_render_time
    }

    fn render(&mut self, time: f32) -> Result<(), String> {
        let (width, height) = self.canvas.size();
        self.parameters.insert("u_time".into(), UniformValue::Scalar(time));
        self.parameters.insert(
            "u_resolution".into(),
            UniformValue::Vector(vec![width as f32, height as f32]),
        );

        self.gl.begin_draw(&self.program, width, height);
        for (name, location) in &self.uniform_locations {
            if let Some(value) = self.parameters.get(name) {
                upload_uniform(&self.gl, location, value);
            }
        }
        self.gl.bind_quad(&self.program, &self.vertex_buffer, &self.index_buffer);
        self.gl.draw_indexed(QUAD_INDICES.len() as i32)?;
        self.last_render_time = time;
        Ok(())
    }

    fn release(self) {
        let Visualizer {
            gl,
            program,
            vertex_buffer,
            index_buffer,
            ..
        } = self;
        gl.delete_program(program);
        gl.delete_buffer(vertex_buffer);
        gl.delete_buffer(index_buffer);
    }
}

fn upload_uniform<G: GlContext>(gl: &G, location: &G::Location, value: &UniformValue) {
    match value {
        UniformValue::Scalar(v) => gl.uniform1f(location, *v),
        UniformValue::Vector(v) if (2..=4).contains(&v.len()) => gl.uniform_fv(location, v),
        UniformValue::Vector(v) => log::debug!("Skipping uniform vector of length {}", v.len()),
    }
}

/// Compiles and links both stages. Shader objects never outlive this call.
fn build_program<G: GlContext>(gl: &G, shader: &CompiledShader) -> Result<G::Program, VisualizerError> {
    let vertex = gl
        .compile_shader(ShaderStage::Vertex, &shader.vertex_source)
        .map_err(|log| VisualizerError::ShaderCompile {
            stage: ShaderStage::Vertex,
            log,
        })?;
    let fragment = match gl.compile_shader(ShaderStage::Fragment, &shader.fragment_source) {
        Ok(fragment) => fragment,
        Err(log) => {
            gl.delete_shader(vertex);
            return Err(VisualizerError::ShaderCompile {
                stage: ShaderStage::Fragment,
                log,
            });
        }
    };
    let linked = gl.link_program(&vertex, &fragment);
    gl.delete_shader(vertex);
    gl.delete_shader(fragment);
    linked.map_err(|log| VisualizerError::ProgramLink { log })
}

/// Locations for every declared uniform; inactive ones are skipped.
fn bind_locations<G: GlContext>(
    gl: &G,
    program: &G::Program,
    shader: &CompiledShader,
) -> BTreeMap<String, G::Location> {
    shader
        .uniforms
        .keys()
        .filter_map(|name| gl.uniform_location(program, name).map(|loc| (name.clone(), loc)))
        .collect()
}

pub struct VisualizerPool<C: Canvas> {
    registry: Rc<GeometryRegistry>,
    bus: EventBus,
    inbox: Mailbox,
    options: PoolOptions,
    visualizers: BTreeMap<String, Visualizer<C>>,
    defaults: BTreeMap<String, UniformValue>,
    animations: AnimationSlots,
    started_at: Option<f64>,
    anonymous_count: u64,
}

impl<C: Canvas> VisualizerPool<C> {
    pub fn new(registry: Rc<GeometryRegistry>, bus: EventBus, options: PoolOptions) -> Self {
        let inbox = bus.mailbox(&[
            Topic::AnimateUniform,
            Topic::MasterParameterChanged,
            Topic::BackgroundGeometryChanged,
        ]);
        let defaults = FRAGMENT_UNIFORMS
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default_value()))
            .collect();
        log::info!("VisualizerPool initialized with {} geometries", registry.len());
        Self {
            registry,
            bus,
            inbox,
            options,
            visualizers: BTreeMap::new(),
            defaults,
            animations: AnimationSlots::default(),
            started_at: None,
            anonymous_count: 0,
        }
    }

    /// Starts the render loop clock. Later calls are ignored.
    pub fn start(&mut self, now_ms: f64) {
        if self.started_at.is_some() {
            log::debug!("Render loop already running");
            return;
        }
        self.started_at = Some(now_ms);
        log::info!("Render loop started");
    }

    pub fn stop(&mut self) {
        if self.started_at.take().is_some() {
            log::info!("Render loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn create_visualizer(
        &mut self,
        canvas: C,
        geometry_name: &str,
        parameters: BTreeMap<String, UniformValue>,
    ) -> Result<String, VisualizerError> {
        let registry = self.registry.clone();
        let (Some(geometry), Some(shader)) = (
            registry.get_geometry(geometry_name),
            registry.get_shader(geometry_name),
        ) else {
            return Err(VisualizerError::UnknownGeometry(geometry_name.to_string()));
        };

        let id = match canvas.id().filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                self.anonymous_count += 1;
                format!("visualizer-{}", self.anonymous_count)
            }
        };
        log::info!("Creating visualizer: {} with geometry: {}", id, geometry_name);

        let gl = ContextKind::PREFERENCE
            .iter()
            .find_map(|kind| canvas.context(*kind))
            .ok_or_else(|| VisualizerError::WebGlUnavailable(id.clone()))?;
        let (width, height) = canvas.size();
        gl.configure(width, height);

        let program = build_program(&gl, shader)?;
        let Some(vertex_buffer) = gl.create_vertex_buffer(&QUAD_VERTICES) else {
            gl.delete_program(program);
            return Err(VisualizerError::ResourceAllocation("vertex buffer"));
        };
        let Some(index_buffer) = gl.create_index_buffer(&QUAD_INDICES) else {
            gl.delete_buffer(vertex_buffer);
            gl.delete_program(program);
            return Err(VisualizerError::ResourceAllocation("index buffer"));
        };
        let uniform_locations = bind_locations(&gl, &program, shader);

        let mut merged = self.defaults.clone();
        for (name, value) in &geometry.default_parameters {
            merged.insert(name.clone(), UniformValue::Scalar(*value));
        }
        merged.extend(parameters);

        let visualizer = Visualizer {
            id: id.clone(),
            canvas,
            gl,
            program,
            vertex_buffer,
            index_buffer,
            geometry: geometry_name.to_string(),
            uniform_locations,
            parameters: merged,
            is_active: true,
            last_render_time: 0.0,
        };
        if let Some(previous) = self.visualizers.insert(id.clone(), visualizer) {
            log::warn!("Visualizer {} replaced an existing one", id);
            self.animations.cancel_visualizer(&id);
            previous.release();
        }

        self.bus.publish(Event::VisualizerCreated {
            id: id.clone(),
            geometry: geometry_name.to_string(),
        });
        Ok(id)
    }

    /// Swaps the program of a live visualizer. Buffers and parameters stay.
    pub fn set_visualizer_geometry(&mut self, id: &str, geometry_name: &str) -> bool {
        let registry = self.registry.clone();
        let (Some(_), Some(shader)) = (
            registry.get_geometry(geometry_name),
            registry.get_shader(geometry_name),
        ) else {
            log::error!("Geometry or shader not found: {}", geometry_name);
            return false;
        };
        let Some(visualizer) = self.visualizers.get_mut(id) else {
            log::warn!("Visualizer not found: {}", id);
            return false;
        };

        let program = match build_program(&visualizer.gl, shader) {
            Ok(program) => program,
            Err(err) => {
                log::error!("Failed to update visualizer geometry: {}", err);
                return false;
            }
        };
        let old = std::mem::replace(&mut visualizer.program, program);
        visualizer.gl.delete_program(old);
        visualizer.uniform_locations = bind_locations(&visualizer.gl, &visualizer.program, shader);
        visualizer.geometry = geometry_name.to_string();
        log::info!("Updated visualizer {} to geometry: {}", id, geometry_name);

        self.bus.publish(Event::VisualizerGeometryChanged {
            id: id.to_string(),
            geometry: geometry_name.to_string(),
        });
        true
    }

    pub fn remove_visualizer(&mut self, id: &str) -> bool {
        let Some(visualizer) = self.visualizers.remove(id) else {
            return false;
        };
        self.animations.cancel_visualizer(id);
        visualizer.release();
        log::info!("Removed visualizer: {}", id);
        self.bus.publish(Event::VisualizerRemoved { id: id.to_string() });
        true
    }

    /// Starts interpolating `uniform` towards `target`, replacing any
    /// animation already running on the same uniform.
    pub fn animate_visualizer(
        &mut self,
        id: &str,
        uniform: &str,
        target: &ValueDescriptor,
        duration_ms: f64,
        curve: Curve,
        now_ms: f64,
    ) -> bool {
        let Some(visualizer) = self.visualizers.get(id) else {
            log::warn!("Visualizer not found: {}", id);
            return false;
        };
        let baseline = self.global_default(uniform);
        let current = visualizer.parameters.get(uniform).cloned().unwrap_or_else(|| baseline.clone());
        let Some(final_value) = target.resolve_uniform(&current, &baseline) else {
            log::warn!("Non-numeric target {:?} for uniform {}", target, uniform);
            return false;
        };
        self.start_task(id, uniform, current, final_value, duration_ms, curve, now_ms);
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn start_task(
        &mut self,
        id: &str,
        uniform: &str,
        start_value: UniformValue,
        final_value: UniformValue,
        duration_ms: f64,
        curve: Curve,
        now_ms: f64,
    ) {
        let task = UniformAnimationTask {
            visualizer_id: id.to_string(),
            uniform: uniform.to_string(),
            start_value,
            final_value,
            start_time: now_ms,
            duration_ms,
            curve,
        };
        if let Some(previous) = self.animations.start(task) {
            log::debug!(
                "Superseded animation of {}.{} towards {}",
                id,
                uniform,
                previous.final_value
            );
        }
    }

    /// Sets one visualizer's parameter immediately (clamped to the contract range).
    pub fn update_visualizer_parameter(&mut self, id: &str, parameter: &str, value: UniformValue) -> bool {
        let value = clamp_to_contract(parameter, value);
        let Some(visualizer) = self.visualizers.get_mut(id) else {
            return false;
        };
        self.animations.cancel(id, parameter);
        visualizer.parameters.insert(parameter.to_string(), value.clone());
        self.bus.publish(Event::VisualizerParameterUpdated {
            id: id.to_string(),
            parameter: parameter.to_string(),
            value,
        });
        true
    }

    /// Sets a parameter on every visualizer and makes it the new default.
    pub fn update_global_parameter(&mut self, parameter: &str, value: UniformValue) {
        let value = clamp_to_contract(parameter, value);
        self.defaults.insert(parameter.to_string(), value.clone());
        for (id, visualizer) in self.visualizers.iter_mut() {
            self.animations.cancel(id, parameter);
            visualizer.parameters.insert(parameter.to_string(), value.clone());
        }
        self.bus.publish(Event::GlobalParameterUpdated {
            parameter: parameter.to_string(),
            value,
        });
    }

    /// One render-loop frame.
    pub fn tick(&mut self, now_ms: f64) {
        self.process_inbox(now_ms);
        let Some(started_at) = self.started_at else {
            return;
        };

        for step in self.animations.advance(now_ms) {
            if let Some(visualizer) = self.visualizers.get_mut(&step.visualizer_id) {
                visualizer.parameters.insert(step.uniform, step.value);
            }
        }

        let time = ((now_ms - started_at) / 1000.0).max(0.0) as f32;
        let mut faults = Vec::new();
        for visualizer in self.visualizers.values_mut().filter(|v| v.is_active) {
            if let Err(reason) = visualizer.render(time) {
                log::error!("Render error for visualizer {}: {}", visualizer.id, reason);
                visualizer.is_active = false;
                faults.push((visualizer.id.clone(), reason));
            }
        }
        for (id, reason) in faults {
            self.bus.publish(Event::VisualizerFaulted { id, reason });
        }

        self.bus.publish(Event::RenderFrame {
            time,
            visualizer_count: self.visualizers.len(),
        });
    }

    fn process_inbox(&mut self, now_ms: f64) {
        for event in self.inbox.drain() {
            match event {
                Event::AnimateUniform(request) => {
                    self.animate_visualizer(
                        &request.visualizer_id,
                        &request.uniform,
                        &request.target,
                        request.duration_ms,
                        request.curve,
                        now_ms,
                    );
                }
                Event::MasterParameterChanged { parameter, value } => {
                    self.apply_master_parameter(&parameter, value, now_ms);
                }
                Event::BackgroundGeometryChanged { geometry } => {
                    let Some(background) = self.options.background_visualizer.clone() else {
                        continue;
                    };
                    let current = self.visualizers.get(&background).map(|v| v.geometry.clone());
                    if current.is_some_and(|current| current != geometry) {
                        self.set_visualizer_geometry(&background, &geometry);
                    }
                }
                _ => {}
            }
        }
    }

    fn apply_master_parameter(&mut self, parameter: &str, value: UniformValue, now_ms: f64) {
        if contract_spec(parameter).is_none() && !self.defaults.contains_key(parameter) {
            log::debug!("Master parameter {} is not a uniform", parameter);
            return;
        }
        let value = clamp_to_contract(parameter, value);
        self.defaults.insert(parameter.to_string(), value.clone());
        let starts: Vec<(String, UniformValue)> = self
            .visualizers
            .iter()
            .map(|(id, v)| (id.clone(), v.parameters.get(parameter).cloned().unwrap_or_else(|| value.clone())))
            .collect();
        for (id, current) in starts {
            self.start_task(
                &id,
                parameter,
                current,
                value.clone(),
                self.options.master_transition_ms,
                self.options.master_transition_curve,
                now_ms,
            );
        }
    }

    pub fn global_default(&self, uniform: &str) -> UniformValue {
        self.defaults
            .get(uniform)
            .cloned()
            .unwrap_or(UniformValue::Scalar(0.0))
    }

    pub fn get_visualizer(&self, id: &str) -> Option<&Visualizer<C>> {
        self.visualizers.get(id)
    }

    pub fn live_value(&self, id: &str, uniform: &str) -> Option<&UniformValue> {
        self.visualizers.get(id)?.parameters.get(uniform)
    }

    pub fn visualizer_ids(&self) -> impl Iterator<Item = &str> {
        self.visualizers.keys().map(String::as_str)
    }

    pub fn visualizer_count(&self) -> usize {
        self.visualizers.len()
    }

    pub fn active_visualizer_count(&self) -> usize {
        self.visualizers.values().filter(|v| v.is_active).count()
    }

    pub fn is_animating(&self, id: &str, uniform: &str) -> bool {
        self.animations.get(id, uniform).is_some()
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn registry(&self) -> &GeometryRegistry {
        &self.registry
    }
}

fn clamp_to_contract(parameter: &str, value: UniformValue) -> UniformValue {
    match contract_spec(parameter) {
        Some(spec) => spec.clamp(&value),
        None => value,
    }
}
