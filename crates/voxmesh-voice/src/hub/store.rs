use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use voxmesh_common::{PeerId, RoomId};

use crate::protocol::{Participant, SignalBody, SignalEnvelope};

/// Sender id stamped on envelopes the hub itself produces.
pub const RELAY_PEER_ID: &str = "relay";

struct Member {
    display_name: String,
    tx: mpsc::Sender<SignalEnvelope>,
    last_seen: Instant,
    ticket: u64,
}

type Targets = Vec<(PeerId, mpsc::Sender<SignalEnvelope>)>;

/// Proof of one registration. A newer join by the same peer invalidates
/// older tickets, so a stale connection cannot evict its replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberTicket {
    pub room_id: RoomId,
    pub peer_id: PeerId,
    id: u64,
}

/// Thread-safe room membership store.
#[derive(Clone, Default)]
pub struct RoomHub {
    rooms: Arc<RwLock<HashMap<RoomId, HashMap<PeerId, Member>>>>,
    next_ticket: Arc<AtomicU64>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer` in `room`. The newcomer receives a snapshot of the
    /// members already present (in join order); everyone else receives the
    /// `join`. A peer that joins again replaces its previous registration.
    pub async fn join(
        &self,
        room: &RoomId,
        peer: &PeerId,
        display_name: &str,
        tx: mpsc::Sender<SignalEnvelope>,
    ) -> MemberTicket {
        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        let (participants, others) = {
            let mut rooms = self.rooms.write().await;
            let members = rooms.entry(room.clone()).or_default();

            let mut existing: Vec<(&PeerId, &Member)> =
                members.iter().filter(|(p, _)| *p != peer).collect();
            existing.sort_by_key(|(_, m)| m.ticket);

            let participants: Vec<Participant> = existing
                .iter()
                .map(|(p, m)| Participant {
                    peer_id: (*p).clone(),
                    display_name: m.display_name.clone(),
                })
                .collect();
            let others: Targets = existing
                .iter()
                .map(|(p, m)| ((*p).clone(), m.tx.clone()))
                .collect();

            if members
                .insert(
                    peer.clone(),
                    Member {
                        display_name: display_name.to_string(),
                        tx: tx.clone(),
                        last_seen: Instant::now(),
                        ticket: id,
                    },
                )
                .is_some()
            {
                info!(room = %room, peer = %peer, "Member re-joined, replacing previous registration");
            }

            (participants, others)
        };

        info!(
            room = %room,
            peer = %peer,
            present = participants.len(),
            "Member joined"
        );

        let snapshot = SignalEnvelope::unicast(
            room.clone(),
            PeerId::from(RELAY_PEER_ID),
            peer.clone(),
            SignalBody::RosterSnapshot { participants },
        );
        deliver(vec![(peer.clone(), tx)], &snapshot).await;
        deliver(
            others,
            &SignalEnvelope::join(room.clone(), peer.clone(), display_name),
        )
        .await;

        MemberTicket {
            room_id: room.clone(),
            peer_id: peer.clone(),
            id,
        }
    }

    /// Route one envelope from a registered member. Returns false when the
    /// envelope was dropped.
    pub async fn route(&self, ticket: &MemberTicket, envelope: SignalEnvelope) -> bool {
        if envelope.room_id != ticket.room_id || envelope.sender_peer_id != ticket.peer_id {
            warn!(
                room = %ticket.room_id,
                peer = %ticket.peer_id,
                claimed_room = %envelope.room_id,
                claimed_sender = %envelope.sender_peer_id,
                "Dropping envelope with mismatched origin"
            );
            return false;
        }

        let targets = {
            let mut rooms = self.rooms.write().await;
            let Some(members) = rooms.get_mut(&ticket.room_id) else {
                warn!(room = %ticket.room_id, peer = %ticket.peer_id, "Envelope from member of unknown room");
                return false;
            };
            match members.get_mut(&ticket.peer_id) {
                Some(member) if member.ticket == ticket.id => member.last_seen = Instant::now(),
                _ => {
                    warn!(room = %ticket.room_id, peer = %ticket.peer_id, "Envelope from expired member");
                    return false;
                }
            }

            match &envelope.body {
                SignalBody::Heartbeat => return true,
                SignalBody::Join { .. } | SignalBody::RosterSnapshot { .. } => {
                    warn!(peer = %ticket.peer_id, kind = envelope.kind(), "Unexpected envelope from member");
                    return false;
                }
                SignalBody::Leave => {
                    members.remove(&ticket.peer_id);
                    let others = collect_targets(members, &ticket.peer_id);
                    if members.is_empty() {
                        rooms.remove(&ticket.room_id);
                    }
                    info!(room = %ticket.room_id, peer = %ticket.peer_id, "Member left");
                    others
                }
                _ => match &envelope.target_peer_id {
                    Some(target) => match members.get(target) {
                        Some(m) => vec![(target.clone(), m.tx.clone())],
                        None => {
                            debug!(
                                room = %ticket.room_id,
                                target = %target,
                                kind = envelope.kind(),
                                "Unicast target not present"
                            );
                            return false;
                        }
                    },
                    None => collect_targets(members, &ticket.peer_id),
                },
            }
        };

        deliver(targets, &envelope).await;
        true
    }

    /// The member's connection went away. If it had not left already, the
    /// rest of the room is told it left.
    pub async fn disconnect(&self, ticket: &MemberTicket) {
        let others = {
            let mut rooms = self.rooms.write().await;
            let Some(members) = rooms.get_mut(&ticket.room_id) else {
                return;
            };
            if !members
                .get(&ticket.peer_id)
                .is_some_and(|m| m.ticket == ticket.id)
            {
                return;
            }
            members.remove(&ticket.peer_id);
            let others = collect_targets(members, &ticket.peer_id);
            if members.is_empty() {
                rooms.remove(&ticket.room_id);
            }
            others
        };

        info!(room = %ticket.room_id, peer = %ticket.peer_id, "Member dropped without leaving");
        deliver(
            others,
            &SignalEnvelope::leave(ticket.room_id.clone(), ticket.peer_id.clone()),
        )
        .await;
    }

    /// Expire members not heard from within `ttl`. Returns who was removed.
    pub async fn reap_stale(&self, ttl: Duration) -> Vec<(RoomId, PeerId)> {
        let mut notices: Vec<(SignalEnvelope, Targets)> = Vec::new();
        let mut reaped = Vec::new();
        {
            let mut rooms = self.rooms.write().await;
            let now = Instant::now();
            for (room_id, members) in rooms.iter_mut() {
                let stale: Vec<PeerId> = members
                    .iter()
                    .filter(|(_, m)| now.duration_since(m.last_seen) > ttl)
                    .map(|(p, _)| p.clone())
                    .collect();
                for peer in stale {
                    members.remove(&peer);
                    info!(room = %room_id, peer = %peer, "Reaping silent member");
                    reaped.push((room_id.clone(), peer.clone()));
                    notices.push((
                        SignalEnvelope::leave(room_id.clone(), peer.clone()),
                        collect_targets(members, &peer),
                    ));
                }
            }
            rooms.retain(|_, members| !members.is_empty());
        }

        for (envelope, targets) in notices {
            deliver(targets, &envelope).await;
        }
        reaped
    }

    /// Members of `room` in join order.
    pub async fn members(&self, room: &RoomId) -> Vec<Participant> {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room) else {
            return Vec::new();
        };
        let mut list: Vec<(&PeerId, &Member)> = members.iter().collect();
        list.sort_by_key(|(_, m)| m.ticket);
        list.into_iter()
            .map(|(p, m)| Participant {
                peer_id: p.clone(),
                display_name: m.display_name.clone(),
            })
            .collect()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn member_count(&self) -> usize {
        self.rooms.read().await.values().map(HashMap::len).sum()
    }
}

fn collect_targets(members: &HashMap<PeerId, Member>, except: &PeerId) -> Targets {
    members
        .iter()
        .filter(|(p, _)| *p != except)
        .map(|(p, m)| (p.clone(), m.tx.clone()))
        .collect()
}

async fn deliver(targets: Targets, envelope: &SignalEnvelope) {
    for (peer, tx) in targets {
        if tx.send(envelope.clone()).await.is_err() {
            debug!(peer = %peer, kind = envelope.kind(), "Member channel closed");
        }
    }
}
