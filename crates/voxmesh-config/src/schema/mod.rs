//! Configuration schema types for voxmesh.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod ice;
mod leave;
mod logging;
mod media;
mod relay;
mod session;
mod signaling;

pub use ice::*;
pub use leave::*;
pub use logging::*;
pub use media::*;
pub use relay::*;
pub use session::*;
pub use signaling::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for voxmesh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxConfig {
    pub signaling: SignalingConfig,
    pub session: SessionConfig,
    pub media: MediaConfig,
    pub ice: IceConfig,
    pub leave: LeaveConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}
