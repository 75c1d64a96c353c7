use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::{PeerId, RoomId};

/// "This user joined/left voice" facts for surfaces outside the call.
///
/// Published by the coordinator, never read back by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipEvent {
    Joined {
        room_id: RoomId,
        peer_id: PeerId,
        display_name: String,
    },
    Left {
        room_id: RoomId,
        peer_id: PeerId,
    },
}

#[derive(Clone)]
pub struct MembershipBus {
    sender: broadcast::Sender<MembershipEvent>,
}

impl MembershipBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: MembershipEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for MembershipBus {
    fn default() -> Self {
        Self::new(64)
    }
}
