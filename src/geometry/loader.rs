use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::template::{default_fragment_shader, DEFAULT_VERTEX_SHADER};
use crate::error::ShaderLoadError;

/// Source of externally supplied shader files.
pub trait ShaderLoader {
    fn load(&self, path: &str) -> Result<String, ShaderLoadError>;
}

/// Reads shader files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsShaderLoader {
    root: PathBuf,
}

impl FsShaderLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderLoader for FsShaderLoader {
    fn load(&self, path: &str) -> Result<String, ShaderLoadError> {
        let full = self.root.join(path.trim_start_matches('/'));
        std::fs::read_to_string(&full).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ShaderLoadError::NotFound(full.display().to_string())
            } else {
                ShaderLoadError::Io { path: full, source }
            }
        })
    }
}

/// Shader files already fetched by the host page.
#[derive(Debug, Clone, Default)]
pub struct MemoryShaderLoader {
    files: HashMap<String, String>,
}

impl MemoryShaderLoader {
    pub fn new(files: HashMap<String, String>) -> Self {
        Self { files }
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }
}

impl ShaderLoader for MemoryShaderLoader {
    fn load(&self, path: &str) -> Result<String, ShaderLoadError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ShaderLoadError::NotFound(path.to_string()))
    }
}

/// Vertex and fragment halves of a shader file.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

fn vertex_section() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)#vertex\s+(.*?)(?:#fragment|\z)").expect("vertex pattern is valid"))
}

fn fragment_section() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)#fragment\s+(.*)\z").expect("fragment pattern is valid"))
}

fn section(pattern: &Regex, source: &str) -> Option<String> {
    pattern
        .captures(source)
        .map(|caps| caps[1].trim().to_string())
        .filter(|body| !body.is_empty())
}

/// Splits a `#vertex` / `#fragment` file. Missing halves use the defaults.
pub fn parse_shader_file(source: &str) -> ShaderSources {
    let vertex = section(vertex_section(), source).unwrap_or_else(|| {
        log::warn!("Shader file has no #vertex section, using default vertex shader");
        DEFAULT_VERTEX_SHADER.to_string()
    });
    let fragment = section(fragment_section(), source).unwrap_or_else(|| {
        log::warn!("Shader file has no #fragment section, using default fragment shader");
        default_fragment_shader()
    });
    ShaderSources { vertex, fragment }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_both_sections() {
        let file = "#vertex\nvoid main() { gl_Position = vec4(0.0); }\n#fragment\nvoid main() { gl_FragColor = vec4(1.0); }\n";
        let sources = parse_shader_file(file);
        assert_eq!(sources.vertex, "void main() { gl_Position = vec4(0.0); }");
        assert_eq!(sources.fragment, "void main() { gl_FragColor = vec4(1.0); }");
    }

    #[test]
    fn missing_sections_fall_back() {
        let only_fragment = parse_shader_file("#fragment\nvoid main() {}");
        assert_eq!(only_fragment.vertex, DEFAULT_VERTEX_SHADER);
        assert_eq!(only_fragment.fragment, "void main() {}");

        let garbage = parse_shader_file("not a shader file");
        assert_eq!(garbage.vertex, DEFAULT_VERTEX_SHADER);
        assert_eq!(garbage.fragment, default_fragment_shader());
    }

    #[test]
    fn vertex_only_file_runs_to_end() {
        let sources = parse_shader_file("#vertex\nvoid main() {}\n");
        assert_eq!(sources.vertex, "void main() {}");
        assert_eq!(sources.fragment, default_fragment_shader());
    }

    #[test]
    fn memory_loader_reports_missing_files() {
        let mut loader = MemoryShaderLoader::default();
        loader.insert("shaders/a.glsl", "#vertex\nx\n#fragment\ny");
        assert!(loader.load("shaders/a.glsl").is_ok());
        assert!(matches!(loader.load("nope.glsl"), Err(ShaderLoadError::NotFound(_))));
    }
}
