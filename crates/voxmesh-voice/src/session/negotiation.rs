//! Offer/answer roles, roster upkeep, and per-peer failure handling.

use std::fmt::Display;

use tracing::{debug, info, warn};
use voxmesh_common::{NegotiationError, PeerId};

use super::actor::SessionActor;
use super::keepalive::schedule;
use super::types::{SessionState, Timer, VoiceEvent};
use crate::protocol::{IceCandidate, Participant, SignalBody, SignalEnvelope};
use crate::registry::{ConnectionEvent, LinkId, LinkRole, LinkState, RegistryNotice, SdpKind};

impl SessionActor {
    /// The lower id initiates. Both sides of a pair evaluate this the same way.
    pub(super) fn initiates_toward(&self, peer: &PeerId) -> bool {
        self.identity.peer_id < *peer
    }

    pub(super) async fn handle_envelope(&mut self, envelope: SignalEnvelope) {
        if envelope.room_id != self.room {
            debug!(room = %self.room, other = %envelope.room_id, "Envelope for another room dropped");
            return;
        }
        if envelope.sender_peer_id == self.identity.peer_id {
            return;
        }
        if !envelope.is_addressed_to(&self.identity.peer_id) {
            debug!(
                kind = envelope.kind(),
                target = ?envelope.target_peer_id,
                "Unicast for another peer dropped"
            );
            return;
        }

        let peer = envelope.sender_peer_id;
        match envelope.body {
            SignalBody::Join { display_name } => self.on_join(peer, &display_name).await,
            SignalBody::Leave => self.on_leave(&peer).await,
            SignalBody::RosterSnapshot { participants } => self.on_roster_snapshot(participants),
            SignalBody::Offer { sdp, negotiation } => self.on_offer(peer, &sdp, negotiation).await,
            SignalBody::Answer { sdp, negotiation } => self.on_answer(&peer, &sdp, negotiation).await,
            SignalBody::IceCandidate { candidate } => self.on_remote_candidate(&peer, &candidate).await,
            SignalBody::Heartbeat => {}
        }
    }

    async fn on_join(&mut self, peer: PeerId, display_name: &str) {
        if self.registry.contains(&peer) {
            // The peer lost its state; whatever we negotiated is dead.
            info!(peer = %peer, "Known peer joined again, resetting link");
            self.registry.dispose(&peer).await;
        }
        self.add_participant(&peer, display_name);

        if self.initiates_toward(&peer) {
            self.schedule_initiate(peer, 0);
        } else {
            debug!(peer = %peer, "Waiting for offer from lower peer");
        }
    }

    fn on_roster_snapshot(&mut self, participants: Vec<Participant>) {
        debug!(room = %self.room, count = participants.len(), "Roster snapshot");
        for participant in participants {
            if participant.peer_id == self.identity.peer_id {
                continue;
            }
            self.add_participant(&participant.peer_id, &participant.display_name);
            if self.initiates_toward(&participant.peer_id) {
                self.schedule_initiate(participant.peer_id, 0);
            }
        }
    }

    async fn on_leave(&mut self, peer: &PeerId) {
        self.registry.dispose(peer).await;
        self.remove_participant(peer);
    }

    /// Start the initiator sequence after the settling delay, giving the
    /// peer time to finish opening its own link.
    fn schedule_initiate(&self, peer: PeerId, attempt: u32) {
        schedule(
            self.options.settle_delay,
            Timer::Initiate {
                peer,
                epoch: self.epoch,
                attempt,
            },
            self.tasks.clone(),
            self.timer_tx.clone(),
        );
    }

    pub(super) async fn on_initiate_timer(&mut self, peer: PeerId, epoch: u64, attempt: u32) {
        if epoch != self.epoch || self.state != SessionState::Connected {
            return;
        }
        if !self.roster.contains_key(&peer) {
            debug!(peer = %peer, "Peer left before initiating");
            return;
        }
        if self.registry.contains(&peer) {
            debug!(peer = %peer, "Link already exists, not initiating");
            return;
        }

        let link_id = match self.start_offer(&peer).await {
            Ok(link_id) => link_id,
            Err(e) => {
                self.drop_peer(&peer, e).await;
                return;
            }
        };
        self.schedule_deadline(peer, link_id, attempt);
    }

    async fn start_offer(&mut self, peer: &PeerId) -> Result<LinkId, NegotiationError> {
        let tracks = self.local_tracks();
        let link_id = self.registry.create(peer, LinkRole::Initiator, &tracks).await?;
        let sdp = self
            .registry
            .offer(peer)
            .await?
            .ok_or_else(|| NegotiationError::Connection("link vanished".into()))?;

        info!(peer = %peer, link = %link_id, "Sending offer");
        self.send(
            &SignalEnvelope::offer(
                self.room.clone(),
                self.identity.peer_id.clone(),
                peer.clone(),
                sdp,
            )
            .with_negotiation(Some(link_id.0)),
        );
        Ok(link_id)
    }

    async fn on_offer(&mut self, peer: PeerId, sdp: &str, negotiation: Option<u64>) {
        if self.initiates_toward(&peer) && self.registry.state(&peer) == Some(LinkState::Offering) {
            warn!(peer = %peer, "Offer from higher peer while our offer is pending, ignoring");
            return;
        }
        if !self.roster.contains_key(&peer) {
            self.add_participant(&peer, peer.as_str());
        }

        match self.answer_offer(&peer, sdp, negotiation).await {
            Ok(link_id) => self.schedule_deadline(peer, link_id, 0),
            Err(e) => self.drop_peer(&peer, e).await,
        }
    }

    async fn answer_offer(
        &mut self,
        peer: &PeerId,
        sdp: &str,
        negotiation: Option<u64>,
    ) -> Result<LinkId, NegotiationError> {
        let tracks = self.local_tracks();
        let link_id = self.registry.create(peer, LinkRole::Responder, &tracks).await?;
        self.registry
            .apply_remote_description(peer, SdpKind::Offer, sdp)
            .await?;
        let answer = self
            .registry
            .answer(peer)
            .await?
            .ok_or_else(|| NegotiationError::Connection("link vanished".into()))?;

        info!(peer = %peer, link = %link_id, "Sending answer");
        self.send(
            &SignalEnvelope::answer(
                self.room.clone(),
                self.identity.peer_id.clone(),
                peer.clone(),
                answer,
            )
            .with_negotiation(negotiation),
        );
        Ok(link_id)
    }

    /// Answers that name an older offer are dropped. Answers without a
    /// negotiation id apply to whatever offer is pending.
    async fn on_answer(&mut self, peer: &PeerId, sdp: &str, negotiation: Option<u64>) {
        if self.registry.state(peer) != Some(LinkState::Offering) {
            debug!(peer = %peer, state = ?self.registry.state(peer), "Late or duplicate answer discarded");
            return;
        }
        if let Some(id) = negotiation {
            if !self.registry.is_current(peer, LinkId(id)) {
                debug!(peer = %peer, negotiation = id, "Answer for a superseded offer discarded");
                return;
            }
        }
        match self
            .registry
            .apply_remote_description(peer, SdpKind::Answer, sdp)
            .await
        {
            Ok(true) => {
                info!(peer = %peer, "Peer connected");
                self.emit(VoiceEvent::PeerConnected {
                    peer_id: peer.clone(),
                });
            }
            Ok(false) => {}
            Err(e) => self.drop_peer(peer, e).await,
        }
    }

    async fn on_remote_candidate(&mut self, peer: &PeerId, candidate: &IceCandidate) {
        match self.registry.apply_remote_ice_candidate(peer, candidate).await {
            Ok(true) => {}
            Ok(false) => debug!(peer = %peer, "Candidate for unknown link discarded"),
            Err(e) => self.drop_peer(peer, e).await,
        }
    }

    fn schedule_deadline(&self, peer: PeerId, link_id: LinkId, attempt: u32) {
        schedule(
            self.options.negotiation_timeout,
            Timer::NegotiationDeadline {
                peer,
                link_id,
                epoch: self.epoch,
                attempt,
            },
            self.tasks.clone(),
            self.timer_tx.clone(),
        );
    }

    /// A link still negotiating at its deadline is disposed. The initiator
    /// retries while it has attempts left, then gives the peer up; a
    /// responder only disposes and leaves the retry to the initiator.
    pub(super) async fn on_negotiation_deadline(
        &mut self,
        peer: PeerId,
        link_id: LinkId,
        epoch: u64,
        attempt: u32,
    ) {
        if epoch != self.epoch || !self.registry.is_current(&peer, link_id) {
            return;
        }
        let Some(state) = self.registry.state(&peer) else {
            return;
        };
        if !state.is_pending() {
            return;
        }
        let role = self.registry.role(&peer);
        warn!(peer = %peer, link = %link_id, state = %state, attempt, "Negotiation timed out");
        self.registry.dispose(&peer).await;

        if role == Some(LinkRole::Initiator) {
            if attempt < self.options.negotiation_retries && self.roster.contains_key(&peer) {
                self.schedule_initiate(peer, attempt + 1);
            } else {
                self.remove_participant(&peer);
            }
        }
    }

    pub(super) async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match self.registry.handle_event(event).await {
            Some(RegistryNotice::LocalCandidate { peer_id, candidate }) => {
                self.send(&SignalEnvelope::ice_candidate(
                    self.room.clone(),
                    self.identity.peer_id.clone(),
                    peer_id,
                    candidate,
                ));
            }
            Some(RegistryNotice::Connected { peer_id }) => {
                info!(peer = %peer_id, "Peer connected");
                self.emit(VoiceEvent::PeerConnected { peer_id });
            }
            Some(RegistryNotice::Failed { peer_id, state }) => {
                warn!(peer = %peer_id, state = ?state, "Dropping peer after link failure");
                self.remove_participant(&peer_id);
            }
            None => {}
        }
    }

    /// Negotiation failures stay local to the peer.
    async fn drop_peer(&mut self, peer: &PeerId, error: impl Display) {
        warn!(peer = %peer, error = %error, "Negotiation failed, dropping peer");
        self.registry.dispose(peer).await;
        self.remove_participant(peer);
    }
}
