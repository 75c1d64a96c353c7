use async_trait::async_trait;
use tokio::sync::mpsc;
use voxmesh_common::{RoomId, SignalingError};

use crate::identity::Identity;
use crate::protocol::SignalEnvelope;

/// What a link reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Open,
    Message(SignalEnvelope),
    Closed { reason: String },
}

/// Sending half of an open link.
///
/// Envelopes accepted by `send` are delivered in order. Nothing is promised
/// across a close/reopen boundary.
pub trait SignalingLink: Send + Sync {
    fn send(&self, envelope: &SignalEnvelope) -> Result<(), SignalingError>;

    /// Close the link. Idempotent.
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// A freshly opened link and the stream of its events.
pub struct OpenedLink {
    pub link: Box<dyn SignalingLink>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// Opens signaling links for a room.
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn open(&self, room: &RoomId, identity: &Identity) -> Result<OpenedLink, SignalingError>;
}
