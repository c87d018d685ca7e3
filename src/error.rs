use std::path::PathBuf;

use thiserror::Error;

use crate::gl::ShaderStage;

/// Configuration problems. These abort startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No geometries configuration found")]
    MissingGeometries,
    #[error("Geometry `{0}` is declared more than once")]
    DuplicateGeometry(String),
    #[error("State map configuration defines no states")]
    NoStates,
    #[error("{context} references unknown state `{name}`")]
    UnknownState { context: &'static str, name: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid {context} JSON: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while creating a single visualizer. The pool itself keeps running.
#[derive(Error, Debug)]
pub enum VisualizerError {
    #[error("Geometry or shader not found for: {0}")]
    UnknownGeometry(String),
    #[error("WebGL not supported on canvas `{0}`")]
    WebGlUnavailable(String),
    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("Shader program linking failed: {log}")]
    ProgramLink { log: String },
    #[error("Failed to allocate {0}")]
    ResourceAllocation(&'static str),
}

/// Shader file fetch failures. The registry always recovers from these.
#[derive(Error, Debug)]
pub enum ShaderLoadError {
    #[error("Shader file not found: {0}")]
    NotFound(String),
    #[error("Failed to read shader file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
