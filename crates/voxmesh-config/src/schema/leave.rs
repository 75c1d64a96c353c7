use serde::{Deserialize, Serialize};

/// Out-of-band leave notification used when the process is exiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveConfig {
    /// Base URL; the request goes to `{url}/{room_id}/leave`.
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for LeaveConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001/api/voice".into(),
            timeout_ms: 2000,
        }
    }
}
