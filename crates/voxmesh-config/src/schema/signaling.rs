//! Signaling link configuration types.

use serde::{Deserialize, Serialize};

/// Where and how the per-room signaling link connects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// WebSocket URL of the signaling relay.
    pub url: String,
    pub connect_timeout_secs: u64,
    /// Re-join the room when the link drops mid-call.
    pub rejoin_on_drop: bool,
    pub rejoin_attempts: u32,
    /// Base delay between re-join attempts, doubled after each failure.
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001/ws".into(),
            connect_timeout_secs: 15,
            rejoin_on_drop: true,
            rejoin_attempts: 5,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}
