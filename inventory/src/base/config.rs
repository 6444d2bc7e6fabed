use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigErr {
    #[error("could not read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Builder(String),
}

impl From<derive_builder::UninitializedFieldError> for ConfigErr {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        ConfigErr::Builder(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubstrateKind {
    #[default]
    Memory,
}

/// Settings of an inventory.  Every field has a default so an empty document is a valid config.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Builder)]
#[builder(default, setter(into), build_fn(error = "ConfigErr"))]
#[serde(default)]
pub struct InventoryConfig {
    /// page size of [`crate::hyperspace::registry::Inventory::default_pager`]
    pub page_size: usize,
    /// requested page sizes are clamped to this
    pub max_page_size: usize,
    /// tracing filter used when `RUST_LOG` is not set
    pub log: String,
    pub substrate: SubstrateKind,
    pub indexed_vertex_keys: Vec<String>,
    pub indexed_edge_keys: Vec<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_page_size: 1000,
            log: "info".to_string(),
            substrate: SubstrateKind::Memory,
            indexed_vertex_keys: vec!["__type".to_string(), "__eid".to_string(), "__cp".to_string()],
            indexed_edge_keys: vec!["__eid".to_string()],
        }
    }
}

impl InventoryConfig {
    pub fn builder() -> InventoryConfigBuilder {
        InventoryConfigBuilder::default()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigErr> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigErr> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigErr::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }
}
