//! JSON configuration documents.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interaction::Blueprint;
use crate::navigation::NavigationAction;
use crate::value::UniformValue;

/// Geometry list plus shared parameter defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualsConfig {
    /// `None` when the key is absent, which is fatal for the registry.
    pub geometries: Option<Vec<GeometryDescriptor>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryDescriptor {
    pub name: String,
    #[serde(default)]
    pub shader_file: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub default: f32,
    #[serde(default)]
    pub min: Option<f32>,
    #[serde(default)]
    pub max: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorConfig {
    #[serde(default)]
    pub interaction_blueprints: BTreeMap<String, Blueprint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMapConfig {
    #[serde(default)]
    pub initial_state: Option<String>,
    /// Cyclic order for next/previous. Defaults to the state names.
    #[serde(default)]
    pub state_order: Vec<String>,
    pub states: BTreeMap<String, SectionConfig>,
    /// Key name (`"1"`, `"KeyH"`, `"ArrowDown"` ...) to action.
    #[serde(default)]
    pub navigation: BTreeMap<String, NavigationAction>,
    #[serde(default)]
    pub settle_ms: Option<f64>,
}

/// What a single section turns on when it becomes current.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionConfig {
    #[serde(default)]
    pub active_cards: Vec<String>,
    #[serde(default)]
    pub active_theme: Option<String>,
    #[serde(default)]
    pub master_parameters: BTreeMap<String, UniformValue>,
    #[serde(default)]
    pub background_geometry: Option<String>,
}

pub fn parse_json<T: DeserializeOwned>(context: &str, text: &str) -> Result<T, ConfigError> {
    serde_json::from_str(text).map_err(|source| ConfigError::Json {
        context: context.to_string(),
        source,
    })
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_json(&path.display().to_string(), &text)
}
