//! Voice session timing configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval between application-level heartbeats.
    pub heartbeat_interval_secs: u64,
    /// Delay before offering to a newly observed peer.
    pub settle_delay_ms: u64,
    /// How long a link may stay in Offering/Answering.
    pub negotiation_timeout_secs: u64,
    /// Fresh offers made after a negotiation timeout before giving up on a peer.
    pub negotiation_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 15,
            settle_delay_ms: 500,
            negotiation_timeout_secs: 15,
            negotiation_retries: 1,
        }
    }
}
