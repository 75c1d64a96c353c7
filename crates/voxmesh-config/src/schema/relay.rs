use serde::{Deserialize, Serialize};

/// Configuration for the signaling relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub port: u16,
    /// Members without a heartbeat for this long are dropped from their room.
    pub member_ttl_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            member_ttl_secs: 30,
            reap_interval_secs: 10,
        }
    }
}
