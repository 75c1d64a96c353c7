use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use voxmesh_common::{PeerId, RoomId, VoxError};
use voxmesh_config::VoxConfig;

use crate::media::AudioConstraints;
use crate::protocol::Participant;
use crate::registry::{LinkId, LinkSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Signaling dropped; established links are kept while the link is
    /// reopened.
    Rejoining,
}

/// Everything the session reports to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    Connected { room_id: RoomId },
    Disconnected { reason: String },
    ParticipantJoined { peer_id: PeerId, display_name: String },
    ParticipantLeft { peer_id: PeerId },
    PeerConnected { peer_id: PeerId },
    SignalingLost { reason: String, rejoining: bool },
    Rejoined,
    MuteChanged { muted: bool },
    DeafenChanged { deafened: bool },
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub heartbeat_interval: Duration,
    pub settle_delay: Duration,
    pub negotiation_timeout: Duration,
    pub negotiation_retries: u32,
    pub rejoin_on_drop: bool,
    pub rejoin_attempts: u32,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub constraints: AudioConstraints,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&VoxConfig::default())
    }
}

impl From<&VoxConfig> for SessionOptions {
    fn from(config: &VoxConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.session.heartbeat_interval_secs),
            settle_delay: Duration::from_millis(config.session.settle_delay_ms),
            negotiation_timeout: Duration::from_secs(config.session.negotiation_timeout_secs),
            negotiation_retries: config.session.negotiation_retries,
            rejoin_on_drop: config.signaling.rejoin_on_drop,
            rejoin_attempts: config.signaling.rejoin_attempts,
            reconnect_delay: Duration::from_secs(config.signaling.reconnect_delay_secs),
            max_reconnect_delay: Duration::from_secs(config.signaling.max_reconnect_delay_secs),
            constraints: AudioConstraints::from(&config.media),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub room_id: RoomId,
    pub local_peer_id: PeerId,
    pub participants: Vec<Participant>,
    pub links: Vec<LinkSnapshot>,
    pub muted: bool,
    pub deafened: bool,
    /// Whether the local capture device is currently held.
    pub media_active: bool,
}

impl SessionSnapshot {
    pub fn connected_links(&self) -> usize {
        self.links
            .iter()
            .filter(|l| l.state == crate::registry::LinkState::Connected)
            .count()
    }
}

pub(crate) enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), VoxError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    SetMuted(bool),
    SetDeafened(bool),
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Terminate,
}

/// Deferred work posted back onto the session task. `epoch` ties a timer
/// to one signaling link; timers from an older link are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Timer {
    Initiate {
        peer: PeerId,
        epoch: u64,
        attempt: u32,
    },
    NegotiationDeadline {
        peer: PeerId,
        link_id: LinkId,
        epoch: u64,
        attempt: u32,
    },
    Heartbeat {
        epoch: u64,
    },
    Rejoin {
        epoch: u64,
        attempt: u32,
    },
}
