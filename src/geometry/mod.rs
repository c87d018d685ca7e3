//! Geometry descriptors and their compiled shader sources.

mod loader;
mod template;
mod uniforms;

use std::collections::BTreeMap;

pub use loader::{parse_shader_file, FsShaderLoader, MemoryShaderLoader, ShaderLoader, ShaderSources};
pub use template::{
    default_fragment_shader, fragment_template, generate_fragment_shader, DEFAULT_VERTEX_SHADER,
    GEOMETRY_PLACEHOLDER, PROCEDURAL_GEOMETRIES,
};
pub use uniforms::{
    contract_declarations, contract_spec, extract_shader_uniforms, missing_contract_uniforms, ContractDefault,
    UniformDescriptor, UniformMap, UniformSpec, UniformType, FRAGMENT_UNIFORMS,
};

use crate::bus::{Event, EventBus};
use crate::config::{GeometryDescriptor, VisualsConfig};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub name: String,
    pub shader_file: Option<String>,
    pub description: String,
    pub vertex_source: String,
    pub fragment_source: String,
    pub default_parameters: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShader {
    pub vertex_source: String,
    pub fragment_source: String,
    pub uniforms: UniformMap,
}

impl CompiledShader {
    pub fn new(sources: ShaderSources) -> Self {
        let uniforms = extract_shader_uniforms(&sources.fragment);
        Self {
            vertex_source: sources.vertex,
            fragment_source: sources.fragment,
            uniforms,
        }
    }

    /// Contract uniforms this shader does not declare.
    pub fn missing_contract_uniforms(&self) -> Vec<&'static str> {
        missing_contract_uniforms(&self.uniforms)
    }
}

/// Name-keyed geometries and shaders. Immutable once initialized.
#[derive(Debug, Default)]
pub struct GeometryRegistry {
    geometries: BTreeMap<String, Geometry>,
    shaders: BTreeMap<String, CompiledShader>,
}

impl GeometryRegistry {
    /// Loads every configured geometry. Shader files that fail to load or
    /// parse fall back to the procedural generator; only a config without a
    /// `geometries` list is an error.
    pub fn initialize(
        config: &VisualsConfig,
        loader: &dyn ShaderLoader,
        bus: &EventBus,
    ) -> Result<Self, ConfigError> {
        let descriptors = config.geometries.as_ref().ok_or(ConfigError::MissingGeometries)?;
        log::info!("GeometryRegistry initializing with {} geometries", descriptors.len());

        let defaults = default_parameters(config);
        let mut registry = GeometryRegistry::default();
        for descriptor in descriptors {
            if registry.geometries.contains_key(&descriptor.name) {
                return Err(ConfigError::DuplicateGeometry(descriptor.name.clone()));
            }
            let sources = load_sources(descriptor, loader);
            let shader = CompiledShader::new(sources);
            let geometry = Geometry {
                name: descriptor.name.clone(),
                shader_file: descriptor.shader_file.clone(),
                description: descriptor.description.clone(),
                vertex_source: shader.vertex_source.clone(),
                fragment_source: shader.fragment_source.clone(),
                default_parameters: defaults.clone(),
            };
            log::debug!(
                "Registered geometry '{}' with {} uniforms",
                descriptor.name,
                shader.uniforms.len()
            );
            registry.geometries.insert(descriptor.name.clone(), geometry);
            registry.shaders.insert(descriptor.name.clone(), shader);
        }

        log::info!("GeometryRegistry initialized");
        bus.publish(Event::GeometryRegistryReady {
            geometry_count: registry.geometries.len(),
            shader_count: registry.shaders.len(),
        });
        Ok(registry)
    }

    /// Registry with one procedural geometry per built-in name.
    pub fn procedural(bus: &EventBus) -> Self {
        let config = VisualsConfig {
            geometries: Some(
                PROCEDURAL_GEOMETRIES
                    .iter()
                    .map(|name| GeometryDescriptor {
                        name: name.to_string(),
                        shader_file: None,
                        description: format!("Procedural {}", name),
                    })
                    .collect(),
            ),
            parameters: BTreeMap::new(),
        };
        Self::initialize(&config, &MemoryShaderLoader::default(), bus).unwrap_or_default()
    }

    pub fn get_geometry(&self, name: &str) -> Option<&Geometry> {
        self.geometries.get(name)
    }

    pub fn get_shader(&self, name: &str) -> Option<&CompiledShader> {
        self.shaders.get(name)
    }

    pub fn geometry_names(&self) -> Vec<&str> {
        self.geometries.keys().map(String::as_str).collect()
    }

    pub fn shader_names(&self) -> Vec<&str> {
        self.shaders.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

fn default_parameters(config: &VisualsConfig) -> BTreeMap<String, f32> {
    let mut defaults: BTreeMap<String, f32> = FRAGMENT_UNIFORMS
        .iter()
        .filter_map(|spec| match spec.default {
            ContractDefault::Scalar(v) => Some((spec.name.to_string(), v)),
            ContractDefault::Vec2(_) => None,
        })
        .collect();
    for (name, spec) in &config.parameters {
        defaults.insert(name.clone(), spec.default);
    }
    defaults
}

fn load_sources(descriptor: &GeometryDescriptor, loader: &dyn ShaderLoader) -> ShaderSources {
    let procedural = || ShaderSources {
        vertex: DEFAULT_VERTEX_SHADER.to_string(),
        fragment: generate_fragment_shader(&descriptor.name),
    };
    let Some(path) = &descriptor.shader_file else {
        return procedural();
    };
    match loader.load(path) {
        Ok(text) => {
            let sources = parse_shader_file(&text);
            let missing = missing_contract_uniforms(&extract_shader_uniforms(&sources.fragment));
            if !missing.is_empty() {
                log::warn!(
                    "Shader file {} for '{}' does not declare {:?}",
                    path,
                    descriptor.name,
                    missing
                );
            }
            sources
        }
        Err(err) => {
            log::warn!(
                "Could not load shaders for {}, using fallback: {}",
                descriptor.name,
                err
            );
            procedural()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::config::{parse_json, ParameterSpec};

    fn visuals(json: &str) -> VisualsConfig {
        parse_json("visuals", json).unwrap()
    }

    #[test]
    fn missing_geometries_is_fatal() {
        let err = GeometryRegistry::initialize(&VisualsConfig::default(), &MemoryShaderLoader::default(), &EventBus::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingGeometries));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = visuals(r#"{ "geometries": [{ "name": "torus" }, { "name": "torus" }] }"#);
        let err = GeometryRegistry::initialize(&config, &MemoryShaderLoader::default(), &EventBus::new()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateGeometry(name) if name == "torus"));
    }

    #[test]
    fn failed_fetch_falls_back_to_procedural() {
        let config = visuals(r#"{ "geometries": [{ "name": "wave", "shaderFile": "missing.glsl" }] }"#);
        let registry = GeometryRegistry::initialize(&config, &MemoryShaderLoader::default(), &EventBus::new()).unwrap();
        let shader = registry.get_shader("wave").unwrap();
        assert_eq!(shader.fragment_source, generate_fragment_shader("wave"));
        assert_eq!(shader.vertex_source, DEFAULT_VERTEX_SHADER);
    }

    #[test]
    fn loads_external_shader_file() {
        let mut loader = MemoryShaderLoader::default();
        loader.insert(
            "shaders/custom.glsl",
            "#vertex\nattribute vec3 a_position;\nvoid main() { gl_Position = vec4(a_position, 1.0); }\n#fragment\nprecision mediump float;\nuniform float u_time;\nuniform vec3 u_tint;\nvoid main() { gl_FragColor = vec4(u_tint, 1.0); }\n",
        );
        let config = visuals(r#"{ "geometries": [{ "name": "custom", "shaderFile": "shaders/custom.glsl" }] }"#);
        let registry = GeometryRegistry::initialize(&config, &loader, &EventBus::new()).unwrap();
        let shader = registry.get_shader("custom").unwrap();
        assert_eq!(shader.uniforms.len(), 2);
        assert_eq!(shader.uniforms["u_tint"].kind, UniformType::Vec3);
        assert!(shader.missing_contract_uniforms().contains(&"u_dimension"));
    }

    #[test]
    fn config_parameters_override_contract_defaults() {
        let mut config = visuals(r#"{ "geometries": [{ "name": "hypercube" }] }"#);
        config.parameters.insert(
            "u_gridDensity".into(),
            ParameterSpec { default: 12.0, min: None, max: None },
        );
        let registry = GeometryRegistry::initialize(&config, &MemoryShaderLoader::default(), &EventBus::new()).unwrap();
        let geometry = registry.get_geometry("hypercube").unwrap();
        assert_eq!(geometry.default_parameters["u_gridDensity"], 12.0);
        assert_eq!(geometry.default_parameters["u_dimension"], 4.0);
    }

    #[test]
    fn announces_readiness_and_handles_lookups() {
        let bus = EventBus::new();
        let mailbox = bus.mailbox(&[Topic::GeometryRegistryReady]);
        let registry = GeometryRegistry::procedural(&bus);
        assert_eq!(registry.len(), PROCEDURAL_GEOMETRIES.len());
        assert_eq!(
            mailbox.drain(),
            vec![Event::GeometryRegistryReady { geometry_count: 9, shader_count: 9 }]
        );
        assert!(registry.get_geometry("nonexistent").is_none());
        assert!(registry.get_shader("nonexistent").is_none());
    }
}
