use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use voxmesh_common::{NegotiationError, PeerId};

use super::types::{ConnectionEvent, ConnectionEventKind, LinkId, SdpKind, TransportState};
use crate::media::LocalAudioTrack;
use crate::protocol::IceCandidate;

/// One media connection to a remote peer.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: Arc<LocalAudioTrack>) -> Result<(), NegotiationError>;

    async fn create_offer(&self) -> Result<String, NegotiationError>;

    async fn create_answer(&self) -> Result<String, NegotiationError>;

    async fn set_local_description(&self, kind: SdpKind, sdp: &str)
        -> Result<(), NegotiationError>;

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: &str,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError>;

    async fn close(&self) -> Result<(), NegotiationError>;
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        events: ConnectionEvents,
    ) -> Result<Box<dyn PeerConnection>, NegotiationError>;
}

/// Playback of one remote participant's audio.
pub trait AudioSink: Send + Sync {
    fn set_muted(&self, muted: bool);

    /// Stop playback for good.
    fn detach(&self);
}

/// Callback handle given to a connection at creation time. Every event is
/// stamped with the peer and link generation it belongs to.
#[derive(Clone)]
pub struct ConnectionEvents {
    peer_id: PeerId,
    link_id: LinkId,
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionEvents {
    pub(crate) fn new(
        peer_id: PeerId,
        link_id: LinkId,
        tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            peer_id,
            link_id,
            tx,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn link_id(&self) -> LinkId {
        self.link_id
    }

    pub fn ice_candidate(&self, candidate: IceCandidate) {
        self.emit(ConnectionEventKind::IceCandidate(candidate));
    }

    pub fn track(&self, sink: Arc<dyn AudioSink>) {
        self.emit(ConnectionEventKind::Track(sink));
    }

    pub fn state(&self, state: TransportState) {
        self.emit(ConnectionEventKind::State(state));
    }

    fn emit(&self, kind: ConnectionEventKind) {
        let _ = self.tx.send(ConnectionEvent {
            peer_id: self.peer_id.clone(),
            link_id: self.link_id,
            kind,
        });
    }
}
