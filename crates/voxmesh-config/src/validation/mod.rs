//! Full configuration validation.
//!
//! Each area has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod network;
mod session;


use crate::schema::VoxConfig;
use voxmesh_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &VoxConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    network::validate_signaling(&mut errors, config);
    network::validate_ice(&mut errors, config);
    network::validate_leave(&mut errors, config);
    network::validate_relay(&mut errors, config);
    session::validate_session(&mut errors, config);
    session::validate_logging(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
