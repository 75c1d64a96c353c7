use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use voxmesh_common::PeerId;

use super::connection::AudioSink;
use crate::protocol::IceCandidate;

/// Which side of the offer/answer exchange a link plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Idle,
    Offering,
    Answering,
    Connected,
    Closed,
}

impl LinkState {
    /// Negotiation started but not finished.
    pub fn is_pending(self) -> bool {
        matches!(self, LinkState::Idle | LinkState::Offering | LinkState::Answering)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Generation of a link. Every `create` hands out a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkId(pub(crate) u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which half of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// State reported by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

pub enum ConnectionEventKind {
    /// A local ICE candidate to hand to the remote peer.
    IceCandidate(IceCandidate),
    /// Remote audio arrived; the sink plays it.
    Track(Arc<dyn AudioSink>),
    State(TransportState),
}

impl fmt::Debug for ConnectionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEventKind::IceCandidate(c) => f.debug_tuple("IceCandidate").field(c).finish(),
            ConnectionEventKind::Track(_) => f.write_str("Track"),
            ConnectionEventKind::State(s) => f.debug_tuple("State").field(s).finish(),
        }
    }
}

#[derive(Debug)]
pub struct ConnectionEvent {
    pub peer_id: PeerId,
    pub link_id: LinkId,
    pub kind: ConnectionEventKind,
}

/// What the session has to act on after the registry processed a
/// connection event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryNotice {
    LocalCandidate {
        peer_id: PeerId,
        candidate: IceCandidate,
    },
    Connected {
        peer_id: PeerId,
    },
    /// The link failed on its own and has already been disposed.
    Failed {
        peer_id: PeerId,
        state: TransportState,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSnapshot {
    pub peer_id: PeerId,
    pub link_id: LinkId,
    pub role: LinkRole,
    pub state: LinkState,
}
