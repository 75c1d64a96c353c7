use serde::{Deserialize, Serialize};
use voxmesh_common::PeerId;

/// Who the local participant is inside a room.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub peer_id: PeerId,
    pub display_name: String,
    /// Bearer token for the out-of-band leave endpoint.
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("peer_id", &self.peer_id)
            .field("display_name", &self.display_name)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Identity {
    pub fn new(peer_id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            peer_id,
            display_name: display_name.into(),
            access_token: None,
        }
    }

    /// Fresh random peer id with the given display name.
    pub fn generate(display_name: &str) -> Self {
        Self::new(PeerId::generate(), display_name)
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}
