//! voxmesh configuration system.
//!
//! TOML-based configuration with full validation. All config sections use
//! sensible defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{VoxConfig, CONFIG_SCHEMA_VERSION};

use std::path::Path;
use voxmesh_common::ConfigError;

/// Load config from `path`, or from the platform default path when `None`,
/// and reject it if validation fails.
pub fn load_config(path: Option<&Path>) -> Result<VoxConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &VoxConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
