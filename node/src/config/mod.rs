mod network_constants;
mod node_config;
mod node_flags;
mod toml;

pub use network_constants::*;
pub use node_config::*;
pub use node_flags::*;
pub use toml::*;

pub use lattice_core::Networks;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub fn get_node_toml_config_path(data_path: impl Into<PathBuf>) -> PathBuf {
    let mut node_toml = data_path.into();
    node_toml.push("config-node.toml");
    node_toml
}

pub fn read_toml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let toml_str = std::fs::read_to_string(path)?;
    ::toml::from_str(&toml_str).map_err(|e| e.into())
}

/// Reads `config-node.toml` from the data path. Missing settings keep their defaults.
pub fn read_node_config(
    data_path: impl Into<PathBuf>,
    network_params: &NetworkParams,
) -> anyhow::Result<NodeConfig> {
    let path = get_node_toml_config_path(data_path);
    let mut config = NodeConfig::new(network_params);
    if path.exists() {
        let toml: NodeToml = read_toml_file(&path)?;
        config.merge_toml(&toml);
    }
    config.validate()?;
    Ok(config)
}
