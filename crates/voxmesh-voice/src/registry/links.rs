use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use voxmesh_common::{NegotiationError, PeerId};

use super::connection::{AudioSink, ConnectionEvents, PeerConnection, PeerConnectionFactory};
use super::types::{
    ConnectionEvent, ConnectionEventKind, LinkId, LinkRole, LinkSnapshot, LinkState,
    RegistryNotice, SdpKind, TransportState,
};
use crate::media::LocalAudioTrack;
use crate::protocol::IceCandidate;

struct PeerLink {
    id: LinkId,
    role: LinkRole,
    state: LinkState,
    connection: Box<dyn PeerConnection>,
    sink: Option<Arc<dyn AudioSink>>,
}

/// Exclusive owner of all peer links of one session.
pub struct PeerLinkRegistry {
    factory: Arc<dyn PeerConnectionFactory>,
    links: HashMap<PeerId, PeerLink>,
    next_link: u64,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    deafened: bool,
}

impl PeerLinkRegistry {
    /// Returns the registry and the stream of connection events its links
    /// produce. Feed each event back through [`Self::handle_event`].
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                factory,
                links: HashMap::new(),
                next_link: 1,
                events_tx,
                deafened: false,
            },
            events_rx,
        )
    }

    /// Create a link for `peer`, replacing any existing one, and attach
    /// every local track to it.
    pub async fn create(
        &mut self,
        peer: &PeerId,
        role: LinkRole,
        tracks: &[Arc<LocalAudioTrack>],
    ) -> Result<LinkId, NegotiationError> {
        if self.dispose(peer).await {
            debug!(peer = %peer, "Replaced existing link");
        }

        let id = LinkId(self.next_link);
        self.next_link += 1;

        let events = ConnectionEvents::new(peer.clone(), id, self.events_tx.clone());
        let connection = self.factory.create(events).await?;

        for track in tracks {
            if let Err(e) = connection.add_track(Arc::clone(track)).await {
                let _ = connection.close().await;
                return Err(e);
            }
        }

        self.links.insert(
            peer.clone(),
            PeerLink {
                id,
                role,
                state: LinkState::Idle,
                connection,
                sink: None,
            },
        );
        info!(peer = %peer, link = %id, role = ?role, tracks = tracks.len(), "Link created");
        Ok(id)
    }

    /// Build an offer and install it as the local description. `None` when
    /// no link exists for `peer`.
    pub async fn offer(&mut self, peer: &PeerId) -> Result<Option<String>, NegotiationError> {
        let Some(link) = self.links.get(peer) else {
            debug!(peer = %peer, "No link to build an offer on");
            return Ok(None);
        };
        let sdp = link.connection.create_offer().await?;
        self.apply_local_description(peer, SdpKind::Offer, &sdp).await?;
        Ok(Some(sdp))
    }

    /// Build an answer and install it as the local description.
    pub async fn answer(&mut self, peer: &PeerId) -> Result<Option<String>, NegotiationError> {
        let Some(link) = self.links.get(peer) else {
            debug!(peer = %peer, "No link to build an answer on");
            return Ok(None);
        };
        let sdp = link.connection.create_answer().await?;
        self.apply_local_description(peer, SdpKind::Answer, &sdp).await?;
        Ok(Some(sdp))
    }

    /// Returns `Ok(false)` when no link exists for `peer`.
    pub async fn apply_local_description(
        &mut self,
        peer: &PeerId,
        kind: SdpKind,
        sdp: &str,
    ) -> Result<bool, NegotiationError> {
        let Some(link) = self.links.get_mut(peer) else {
            debug!(peer = %peer, kind = ?kind, "Local description for unknown link ignored");
            return Ok(false);
        };
        let next = match (kind, link.state) {
            (SdpKind::Offer, LinkState::Idle) => LinkState::Offering,
            // The responder counts as connected once media flows.
            (SdpKind::Answer, LinkState::Answering) => LinkState::Answering,
            (_, state) => {
                return Err(NegotiationError::WrongState {
                    operation: "set local description",
                    state: state.to_string(),
                })
            }
        };
        link.connection.set_local_description(kind, sdp).await?;
        link.state = next;
        Ok(true)
    }

    /// Returns `Ok(false)` when no link exists for `peer`.
    pub async fn apply_remote_description(
        &mut self,
        peer: &PeerId,
        kind: SdpKind,
        sdp: &str,
    ) -> Result<bool, NegotiationError> {
        let Some(link) = self.links.get_mut(peer) else {
            debug!(peer = %peer, kind = ?kind, "Remote description for unknown link ignored");
            return Ok(false);
        };
        let next = match (kind, link.state) {
            (SdpKind::Offer, LinkState::Idle) => LinkState::Answering,
            (SdpKind::Answer, LinkState::Offering) => LinkState::Connected,
            (_, state) => {
                return Err(NegotiationError::WrongState {
                    operation: "set remote description",
                    state: state.to_string(),
                })
            }
        };
        link.connection.set_remote_description(kind, sdp).await?;
        link.state = next;
        Ok(true)
    }

    /// Returns `Ok(false)` when no link exists for `peer`.
    pub async fn apply_remote_ice_candidate(
        &mut self,
        peer: &PeerId,
        candidate: &IceCandidate,
    ) -> Result<bool, NegotiationError> {
        let Some(link) = self.links.get(peer) else {
            debug!(peer = %peer, "ICE candidate for unknown link ignored");
            return Ok(false);
        };
        link.connection.add_ice_candidate(candidate).await?;
        Ok(true)
    }

    /// Close the connection, detach the sink, forget the link. Idempotent;
    /// returns whether a link existed.
    pub async fn dispose(&mut self, peer: &PeerId) -> bool {
        let Some(mut link) = self.links.remove(peer) else {
            return false;
        };
        let previous = link.state;
        link.state = LinkState::Closed;
        if let Some(sink) = link.sink.take() {
            sink.detach();
        }
        if let Err(e) = link.connection.close().await {
            warn!(peer = %peer, link = %link.id, error = %e, "Error closing connection");
        }
        info!(peer = %peer, link = %link.id, from = %previous, "Link disposed");
        true
    }

    pub async fn dispose_all(&mut self) -> usize {
        let peers: Vec<PeerId> = self.links.keys().cloned().collect();
        let mut count = 0;
        for peer in peers {
            if self.dispose(&peer).await {
                count += 1;
            }
        }
        count
    }

    /// Process one connection event. Events from links that have since
    /// been replaced or disposed are dropped.
    pub async fn handle_event(&mut self, event: ConnectionEvent) -> Option<RegistryNotice> {
        let ConnectionEvent {
            peer_id,
            link_id,
            kind,
        } = event;

        if !self.is_current(&peer_id, link_id) {
            debug!(peer = %peer_id, link = %link_id, event = ?kind, "Event from stale link dropped");
            if let ConnectionEventKind::Track(sink) = kind {
                sink.detach();
            }
            return None;
        }

        match kind {
            ConnectionEventKind::IceCandidate(candidate) => {
                Some(RegistryNotice::LocalCandidate { peer_id, candidate })
            }
            ConnectionEventKind::Track(sink) => {
                sink.set_muted(self.deafened);
                if let Some(link) = self.links.get_mut(&peer_id) {
                    if let Some(old) = link.sink.replace(sink) {
                        old.detach();
                    }
                }
                debug!(peer = %peer_id, deafened = self.deafened, "Remote audio attached");
                None
            }
            ConnectionEventKind::State(TransportState::Connected) => {
                let link = self.links.get_mut(&peer_id)?;
                let was = link.state;
                link.state = LinkState::Connected;
                if was == LinkState::Connected {
                    None
                } else {
                    Some(RegistryNotice::Connected { peer_id })
                }
            }
            ConnectionEventKind::State(state @ (TransportState::Failed | TransportState::Closed)) => {
                warn!(peer = %peer_id, link = %link_id, state = ?state, "Link lost");
                self.dispose(&peer_id).await;
                Some(RegistryNotice::Failed { peer_id, state })
            }
            ConnectionEventKind::State(state) => {
                debug!(peer = %peer_id, link = %link_id, state = ?state, "Transport state");
                None
            }
        }
    }

    /// Mute or unmute every remote sink, including ones attached later.
    pub fn set_deafened(&mut self, deafened: bool) {
        self.deafened = deafened;
        for link in self.links.values() {
            if let Some(sink) = &link.sink {
                sink.set_muted(deafened);
            }
        }
    }

    pub fn is_current(&self, peer: &PeerId, link_id: LinkId) -> bool {
        self.links.get(peer).is_some_and(|l| l.id == link_id)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.links.contains_key(peer)
    }

    pub fn state(&self, peer: &PeerId) -> Option<LinkState> {
        self.links.get(peer).map(|l| l.state)
    }

    pub fn role(&self, peer: &PeerId) -> Option<LinkRole> {
        self.links.get(peer).map(|l| l.role)
    }

    pub fn link_id(&self, peer: &PeerId) -> Option<LinkId> {
        self.links.get(peer).map(|l| l.id)
    }

    /// Peers whose links have not finished negotiating.
    pub fn pending_peers(&self) -> Vec<PeerId> {
        self.links
            .iter()
            .filter(|(_, l)| l.state.is_pending())
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn connected_count(&self) -> usize {
        self.links
            .values()
            .filter(|l| l.state == LinkState::Connected)
            .count()
    }

    /// Links sorted by peer id.
    pub fn snapshot(&self) -> Vec<LinkSnapshot> {
        let mut links: Vec<LinkSnapshot> = self
            .links
            .iter()
            .map(|(peer, l)| LinkSnapshot {
                peer_id: peer.clone(),
                link_id: l.id,
                role: l.role,
                state: l.state,
            })
            .collect();
        links.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        links
    }
}
