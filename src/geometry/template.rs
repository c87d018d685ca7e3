//! GLSL templates and the procedural per-geometry functions.
//!
//! Every geometry body ends with `float geometryField(vec3 pos)`, which the
//! shared fragment `main` samples.

use super::uniforms::contract_declarations;

pub const GEOMETRY_PLACEHOLDER: &str = "// GEOMETRY_FUNCTION_PLACEHOLDER";

/// Geometry names with a dedicated procedural body.
pub const PROCEDURAL_GEOMETRIES: [&str; 9] = [
    "hypercube",
    "tetrahedron",
    "sphere",
    "torus",
    "klein",
    "fractal",
    "wave",
    "crystal",
    "default",
];

pub const DEFAULT_VERTEX_SHADER: &str = r#"attribute vec3 a_position;
attribute vec2 a_texCoord;

uniform mat4 u_matrix;
uniform float u_time;

varying vec2 v_texCoord;
varying vec3 v_position;

void main() {
    v_texCoord = a_texCoord;
    v_position = a_position;
    gl_Position = vec4(a_position, 1.0);
}
"#;

const FRAGMENT_HEAD: &str = "precision mediump float;\n\n";

const FRAGMENT_BODY: &str = r#"
varying vec2 v_texCoord;
varying vec3 v_position;

// GEOMETRY_FUNCTION_PLACEHOLDER

vec3 hsv2rgb(vec3 c) {
    vec4 K = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    vec3 p = abs(fract(c.xxx + K.xyz) * 6.0 - K.www);
    return c.z * mix(K.xxx, clamp(p - K.xxx, 0.0, 1.0), c.y);
}

void main() {
    vec2 st = gl_FragCoord.xy / u_resolution.xy;
    vec3 pos = vec3((st - 0.5) * 2.0, sin(u_time * 0.5) * 0.5);
    pos *= 1.0 + u_morphFactor * 0.25 * sin(u_time * u_rotationSpeed);

    float field = geometryField(pos);
    float edge = smoothstep(u_lineThickness + u_tetraThickness, 0.0, abs(field));
    float intensity = clamp(u_patternIntensity * mix(0.35, 1.0, edge), 0.0, 1.0);
    vec3 color = hsv2rgb(vec3(u_colorShift + u_time * 0.1 + field * 0.2, 0.8, intensity));

    if (u_glitchIntensity > 0.0) {
        float glitch = sin(st.y * 100.0 + u_time * 10.0) * u_glitchIntensity;
        color.r += glitch;
        color.gb *= (1.0 - glitch * 0.5);
    }

    gl_FragColor = vec4(color, 0.8);
}
"#;

/// Fragment template with the placeholder still in place.
pub fn fragment_template() -> String {
    let mut source = String::from(FRAGMENT_HEAD);
    source.push_str(&contract_declarations());
    source.push_str(FRAGMENT_BODY);
    source
}

/// Procedural fragment shader for a geometry name. Unknown names use `default`.
pub fn generate_fragment_shader(geometry: &str) -> String {
    fragment_template().replacen(GEOMETRY_PLACEHOLDER, geometry_function(geometry), 1)
}

pub fn default_fragment_shader() -> String {
    generate_fragment_shader("default")
}

fn geometry_function(geometry: &str) -> &'static str {
    match geometry {
        "hypercube" => HYPERCUBE,
        "tetrahedron" => TETRAHEDRON,
        "sphere" => SPHERE,
        "torus" => TORUS,
        "klein" => KLEIN,
        "fractal" => FRACTAL,
        "wave" => WAVE,
        "crystal" => CRYSTAL,
        _ => DEFAULT_PATTERN,
    }
}

const HYPERCUBE: &str = r#"float hypercubePattern(vec3 pos) {
    vec3 grid = abs(fract(pos * u_gridDensity) - 0.5);
    float d = length(max(grid - 0.3, 0.0));
    return smoothstep(0.1, 0.0, d);
}

vec3 hypercube4D(vec3 pos) {
    float w = sin(u_time * 0.5) * u_dimension;
    vec4 pos4d = vec4(pos, w);
    mat4 rotation = mat4(
        cos(u_time * 0.3), -sin(u_time * 0.3), 0.0, 0.0,
        sin(u_time * 0.3), cos(u_time * 0.3), 0.0, 0.0,
        0.0, 0.0, cos(u_time * 0.2), -sin(u_time * 0.2),
        0.0, 0.0, sin(u_time * 0.2), cos(u_time * 0.2)
    );
    pos4d = rotation * pos4d;
    return pos4d.xyz / (1.0 + abs(pos4d.w) * 0.3);
}

float geometryField(vec3 pos) {
    return 0.5 - hypercubePattern(hypercube4D(pos));
}
"#;

const TETRAHEDRON: &str = r#"float tetrahedronSDF(vec3 p) {
    float a = sqrt(3.0) / 3.0;
    float d1 = dot(p, normalize(vec3(1.0, 1.0, 1.0))) - a;
    float d2 = dot(p, normalize(vec3(-1.0, -1.0, 1.0))) - a;
    float d3 = dot(p, normalize(vec3(1.0, -1.0, -1.0))) - a;
    float d4 = dot(p, normalize(vec3(-1.0, 1.0, -1.0))) - a;
    return max(max(d1, d2), max(d3, d4));
}

float geometryField(vec3 pos) {
    return tetrahedronSDF(pos * (u_dimension * 0.25));
}
"#;

const SPHERE: &str = r#"float sphereHarmonics(vec3 pos) {
    float r = max(length(pos), 0.0001);
    float theta = atan(pos.y, pos.x);
    float phi = acos(clamp(pos.z / r, -1.0, 1.0));
    float y22 = sin(2.0 * phi) * cos(2.0 * theta);
    float modulation = 1.0 + u_morphFactor * y22 * 0.3;
    return abs(r - u_shellWidth * modulation);
}

float geometryField(vec3 pos) {
    return sphereHarmonics(pos * 0.2);
}
"#;

const TORUS: &str = r#"float torusSDF(vec3 p) {
    float major = 0.8;
    float minor = 0.3;
    vec2 q = vec2(length(p.xz) - major, p.y);
    return length(q) - minor;
}

vec3 torusFlow(vec3 pos) {
    float angle = atan(pos.z, pos.x) + u_time * u_rotationSpeed;
    float flow = sin(angle * 3.0 + u_time * 2.0) * u_universeModifier;
    return pos + vec3(0.0, flow * 0.1, 0.0);
}

float geometryField(vec3 pos) {
    return torusSDF(torusFlow(pos.xzy));
}
"#;

const KLEIN: &str = r#"vec3 kleinBottle(vec3 pos) {
    float u = pos.x * 3.14159;
    float v = pos.y * 3.14159 * 2.0;
    float x = (2.0 + cos(v / 2.0) * sin(u) - sin(v / 2.0) * sin(2.0 * u)) * cos(v);
    float y = (2.0 + cos(v / 2.0) * sin(u) - sin(v / 2.0) * sin(2.0 * u)) * sin(v);
    float z = sin(v / 2.0) * sin(u) + cos(v / 2.0) * sin(2.0 * u);
    return vec3(x, y, z) * 0.2;
}

float geometryField(vec3 pos) {
    return length(pos - kleinBottle(pos)) - 0.1 * u_universeModifier;
}
"#;

const FRACTAL: &str = r#"float mandelbulb(vec3 pos) {
    vec3 z = pos;
    float dr = 1.0;
    float r = 0.0;
    float power = 8.0;
    for (int i = 0; i < 8; i++) {
        r = length(z);
        if (r > 2.0 || r < 0.0001) break;
        float theta = acos(z.z / r);
        float phi = atan(z.y, z.x);
        dr = pow(r, power - 1.0) * power * dr + 1.0;
        float zr = pow(r, power);
        theta = theta * power;
        phi = phi * power;
        z = zr * vec3(sin(theta) * cos(phi), sin(phi) * sin(theta), cos(theta));
        z += pos;
    }
    return 0.5 * log(max(r, 0.0001)) * r / dr;
}

float geometryField(vec3 pos) {
    return mandelbulb(pos * (0.8 + u_morphFactor * 0.4));
}
"#;

const WAVE: &str = r#"float waveFunction(vec3 pos) {
    float wave1 = sin(pos.x * 5.0 + u_time * 2.0) * cos(pos.z * 3.0 + u_time * 1.5);
    float wave2 = sin(pos.y * 4.0 + u_time * 1.8) * cos(pos.x * 2.0 + u_time * 2.2);
    float interference = wave1 * wave2 * u_patternIntensity;
    return abs(pos.y - interference * 0.3);
}

float geometryField(vec3 pos) {
    return waveFunction(pos);
}
"#;

const CRYSTAL: &str = r#"float crystalLattice(vec3 pos) {
    vec3 cell = fract(pos * u_gridDensity) - 0.5;
    float d1 = length(cell) - 0.3;
    vec3 edge = abs(cell);
    float d2 = max(edge.x, max(edge.y, edge.z)) - 0.1;
    return min(d1, d2);
}

float geometryField(vec3 pos) {
    return crystalLattice(pos);
}
"#;

const DEFAULT_PATTERN: &str = r#"float defaultPattern(vec3 pos) {
    return length(fract(pos * 2.0) - 0.5) - 0.2;
}

float geometryField(vec3 pos) {
    return defaultPattern(pos);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::uniforms::{extract_shader_uniforms, FRAGMENT_UNIFORMS};

    #[test]
    fn every_geometry_injects_its_function() {
        for name in PROCEDURAL_GEOMETRIES {
            let source = generate_fragment_shader(name);
            assert!(!source.contains(GEOMETRY_PLACEHOLDER), "{} kept placeholder", name);
            assert_eq!(source.matches("float geometryField(vec3 pos)").count(), 1);
            assert!(source.contains("vec3 hsv2rgb(vec3 c)"));
        }
        assert!(generate_fragment_shader("hypercube").contains("hypercube4D"));
        assert!(generate_fragment_shader("klein").contains("kleinBottle"));
    }

    #[test]
    fn unknown_geometry_uses_default_pattern() {
        assert_eq!(generate_fragment_shader("dodecaplex"), default_fragment_shader());
        assert!(default_fragment_shader().contains("defaultPattern"));
    }

    #[test]
    fn fragment_declares_exactly_the_contract() {
        let source = generate_fragment_shader("torus");
        assert_eq!(source.matches("uniform ").count(), FRAGMENT_UNIFORMS.len());
        assert_eq!(extract_shader_uniforms(&source).len(), FRAGMENT_UNIFORMS.len());
    }

    #[test]
    fn vertex_shader_declares_attributes() {
        assert!(DEFAULT_VERTEX_SHADER.contains("attribute vec3 a_position;"));
        assert!(DEFAULT_VERTEX_SHADER.contains("attribute vec2 a_texCoord;"));
        let uniforms = extract_shader_uniforms(DEFAULT_VERTEX_SHADER);
        assert!(uniforms.contains_key("u_matrix") && uniforms.contains_key("u_time"));
    }
}
