//! Uniform metadata: the fixed fragment-shader contract and extraction of
//! `uniform <type> <name>;` declarations from GLSL source.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::value::UniformValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Int,
    Bool,
    Sampler2D,
    Other(String),
}

impl UniformType {
    pub fn parse(glsl: &str) -> Self {
        match glsl {
            "float" => UniformType::Float,
            "vec2" => UniformType::Vec2,
            "vec3" => UniformType::Vec3,
            "vec4" => UniformType::Vec4,
            "mat4" => UniformType::Mat4,
            "int" => UniformType::Int,
            "bool" => UniformType::Bool,
            "sampler2D" => UniformType::Sampler2D,
            other => UniformType::Other(other.to_string()),
        }
    }

    pub fn glsl(&self) -> &str {
        match self {
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::Mat4 => "mat4",
            UniformType::Int => "int",
            UniformType::Bool => "bool",
            UniformType::Sampler2D => "sampler2D",
            UniformType::Other(name) => name,
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniformDescriptor {
    pub name: String,
    pub kind: UniformType,
}

pub type UniformMap = BTreeMap<String, UniformDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContractDefault {
    Scalar(f32),
    Vec2([f32; 2]),
}

/// One entry of the uniform contract every fragment shader declares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSpec {
    pub name: &'static str,
    pub glsl_type: &'static str,
    pub default: ContractDefault,
    pub range: Option<(f32, f32)>,
}

impl UniformSpec {
    pub fn default_value(&self) -> UniformValue {
        match self.default {
            ContractDefault::Scalar(v) => UniformValue::Scalar(v),
            ContractDefault::Vec2(v) => UniformValue::Vector(v.to_vec()),
        }
    }

    pub fn clamp(&self, value: &UniformValue) -> UniformValue {
        match self.range {
            Some((min, max)) => value.clamp(min, max),
            None => value.clone(),
        }
    }
}

const fn spec(name: &'static str, default: f32, min: f32, max: f32) -> UniformSpec {
    UniformSpec {
        name,
        glsl_type: "float",
        default: ContractDefault::Scalar(default),
        range: Some((min, max)),
    }
}

/// The 13 uniforms of the shared fragment template, in declaration order.
pub const FRAGMENT_UNIFORMS: [UniformSpec; 13] = [
    UniformSpec {
        name: "u_time",
        glsl_type: "float",
        default: ContractDefault::Scalar(0.0),
        range: None,
    },
    spec("u_dimension", 4.0, 3.0, 5.0),
    spec("u_morphFactor", 0.5, 0.0, 1.5),
    spec("u_rotationSpeed", 1.0, 0.0, 3.0),
    spec("u_gridDensity", 8.0, 1.0, 25.0),
    spec("u_lineThickness", 0.02, 0.002, 0.1),
    spec("u_patternIntensity", 1.0, 0.0, 3.0),
    spec("u_colorShift", 0.0, -1.0, 1.0),
    spec("u_glitchIntensity", 0.05, 0.0, 0.15),
    spec("u_tetraThickness", 0.02, 0.003, 0.1),
    spec("u_shellWidth", 0.1, 0.005, 0.25),
    spec("u_universeModifier", 1.0, 0.3, 2.5),
    UniformSpec {
        name: "u_resolution",
        glsl_type: "vec2",
        default: ContractDefault::Vec2([800.0, 600.0]),
        range: None,
    },
];

pub fn contract_spec(name: &str) -> Option<&'static UniformSpec> {
    FRAGMENT_UNIFORMS.iter().find(|spec| spec.name == name)
}

/// `uniform float u_time;` lines for the contract.
pub fn contract_declarations() -> String {
    FRAGMENT_UNIFORMS
        .iter()
        .map(|spec| format!("uniform {} {};\n", spec.glsl_type, spec.name))
        .collect()
}

fn uniform_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\buniform\s+(?:(?:lowp|mediump|highp)\s+)?(\w+)\s+(\w+)\s*(?:\[\s*\w+\s*\])?\s*;")
            .expect("uniform pattern is valid")
    })
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").expect("comment pattern is valid"))
}

/// Scans GLSL source for uniform declarations, ignoring comments.
pub fn extract_shader_uniforms(source: &str) -> UniformMap {
    let stripped = comment_pattern().replace_all(source, "");
    uniform_pattern()
        .captures_iter(&stripped)
        .map(|caps| {
            let name = caps[2].to_string();
            let descriptor = UniformDescriptor {
                name: name.clone(),
                kind: UniformType::parse(&caps[1]),
            };
            (name, descriptor)
        })
        .collect()
}

/// Contract uniforms missing from an extracted map.
pub fn missing_contract_uniforms(uniforms: &UniformMap) -> Vec<&'static str> {
    FRAGMENT_UNIFORMS
        .iter()
        .filter(|spec| !uniforms.contains_key(spec.name))
        .map(|spec| spec.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_with_irregular_whitespace() {
        let src = "precision mediump float;\nuniform   float\tu_time ;\nuniform highp vec2 u_res;\n  uniform mat4 u_matrix;";
        let uniforms = extract_shader_uniforms(src);
        assert_eq!(uniforms.len(), 3);
        assert_eq!(uniforms["u_time"].kind, UniformType::Float);
        assert_eq!(uniforms["u_res"].kind, UniformType::Vec2);
        assert_eq!(uniforms["u_matrix"].kind, UniformType::Mat4);
    }

    #[test]
    fn ignores_other_declarations_and_comments() {
        let src = "attribute vec3 a_position;\nvarying vec2 v_uv;\n// uniform float u_gone;\n/* uniform float u_block; */\nfloat uniformity;\nuniform float u_kept;";
        let uniforms = extract_shader_uniforms(src);
        assert_eq!(uniforms.keys().collect::<Vec<_>>(), vec!["u_kept"]);
    }

    #[test]
    fn contract_declarations_round_trip() {
        let uniforms = extract_shader_uniforms(&contract_declarations());
        assert_eq!(uniforms.len(), FRAGMENT_UNIFORMS.len());
        assert!(missing_contract_uniforms(&uniforms).is_empty());
        assert_eq!(uniforms["u_resolution"].kind, UniformType::Vec2);
    }

    #[test]
    fn contract_defaults_sit_inside_their_ranges() {
        for spec in FRAGMENT_UNIFORMS {
            if let (Some((min, max)), ContractDefault::Scalar(v)) = (spec.range, spec.default) {
                assert!(v >= min && v <= max, "{} default outside range", spec.name);
            }
        }
        let dim = contract_spec("u_dimension").unwrap();
        assert_eq!(dim.clamp(&UniformValue::Scalar(9.0)), UniformValue::Scalar(5.0));
    }
}
