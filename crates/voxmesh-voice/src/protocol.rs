//! Signaling wire protocol.
//!
//! One JSON envelope per link message:
//! `{"type": ..., "roomId": ..., "senderPeerId": ..., "targetPeerId"?: ..., ...}`.
//! An envelope without `targetPeerId` is a room broadcast; with one it is
//! unicast and every other receiver discards it.
//!
//! Decoding rejects unknown `type` values explicitly instead of ignoring them.

use serde::{Deserialize, Serialize};
use voxmesh_common::{PeerId, ProtocolError, RoomId};

// ---------------------------------------------------------------------------
// Message type names
// ---------------------------------------------------------------------------

/// Values of the envelope `type` field.
pub mod message_types {
    pub const JOIN: &str = "join";
    pub const LEAVE: &str = "leave";
    pub const ROSTER_SNAPSHOT: &str = "roster_snapshot";
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice_candidate";
    pub const HEARTBEAT: &str = "heartbeat";

    pub const ALL: &[&str] = &[
        JOIN,
        LEAVE,
        ROSTER_SNAPSHOT,
        OFFER,
        ANSWER,
        ICE_CANDIDATE,
        HEARTBEAT,
    ];
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Roster entry for one remote member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub peer_id: PeerId,
    pub display_name: String,
}

/// ICE candidate in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Type-specific part of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SignalBody {
    Join { display_name: String },
    Leave,
    RosterSnapshot { participants: Vec<Participant> },
    /// `negotiation` identifies the offering link. Responders echo it in
    /// their answer; peers that omit it are still understood.
    Offer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        negotiation: Option<u64>,
    },
    Answer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        negotiation: Option<u64>,
    },
    IceCandidate { candidate: IceCandidate },
    Heartbeat,
}

impl SignalBody {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalBody::Join { .. } => message_types::JOIN,
            SignalBody::Leave => message_types::LEAVE,
            SignalBody::RosterSnapshot { .. } => message_types::ROSTER_SNAPSHOT,
            SignalBody::Offer { .. } => message_types::OFFER,
            SignalBody::Answer { .. } => message_types::ANSWER,
            SignalBody::IceCandidate { .. } => message_types::ICE_CANDIDATE,
            SignalBody::Heartbeat => message_types::HEARTBEAT,
        }
    }

    /// Offers, answers, and candidates only make sense addressed to one peer.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            SignalBody::Offer { .. } | SignalBody::Answer { .. } | SignalBody::IceCandidate { .. }
        )
    }
}

/// One signaling message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    pub room_id: RoomId,
    pub sender_peer_id: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_peer_id: Option<PeerId>,
    #[serde(flatten)]
    pub body: SignalBody,
}

impl SignalEnvelope {
    pub fn broadcast(room_id: RoomId, sender: PeerId, body: SignalBody) -> Self {
        Self {
            room_id,
            sender_peer_id: sender,
            target_peer_id: None,
            body,
        }
    }

    pub fn unicast(room_id: RoomId, sender: PeerId, target: PeerId, body: SignalBody) -> Self {
        Self {
            room_id,
            sender_peer_id: sender,
            target_peer_id: Some(target),
            body,
        }
    }

    pub fn join(room_id: RoomId, sender: PeerId, display_name: &str) -> Self {
        Self::broadcast(
            room_id,
            sender,
            SignalBody::Join {
                display_name: display_name.to_string(),
            },
        )
    }

    pub fn leave(room_id: RoomId, sender: PeerId) -> Self {
        Self::broadcast(room_id, sender, SignalBody::Leave)
    }

    pub fn heartbeat(room_id: RoomId, sender: PeerId) -> Self {
        Self::broadcast(room_id, sender, SignalBody::Heartbeat)
    }

    pub fn offer(room_id: RoomId, sender: PeerId, target: PeerId, sdp: String) -> Self {
        Self::unicast(
            room_id,
            sender,
            target,
            SignalBody::Offer {
                sdp,
                negotiation: None,
            },
        )
    }

    pub fn answer(room_id: RoomId, sender: PeerId, target: PeerId, sdp: String) -> Self {
        Self::unicast(
            room_id,
            sender,
            target,
            SignalBody::Answer {
                sdp,
                negotiation: None,
            },
        )
    }

    /// Tag an offer or answer with the offering link's negotiation id.
    /// Other envelopes are returned unchanged.
    pub fn with_negotiation(mut self, id: Option<u64>) -> Self {
        match &mut self.body {
            SignalBody::Offer { negotiation, .. } | SignalBody::Answer { negotiation, .. } => {
                *negotiation = id;
            }
            _ => {}
        }
        self
    }

    pub fn ice_candidate(
        room_id: RoomId,
        sender: PeerId,
        target: PeerId,
        candidate: IceCandidate,
    ) -> Self {
        Self::unicast(room_id, sender, target, SignalBody::IceCandidate { candidate })
    }

    pub fn kind(&self) -> &'static str {
        self.body.kind()
    }

    /// Broadcasts are for everyone; unicasts only for their addressee.
    pub fn is_addressed_to(&self, peer: &PeerId) -> bool {
        self.target_peer_id.as_ref().map_or(true, |t| t == peer)
    }

    /// Parse one wire message.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ProtocolError::MissingType)?;
        if !message_types::ALL.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }

        let envelope: SignalEnvelope =
            serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if envelope.body.requires_target() && envelope.target_peer_id.is_none() {
            return Err(ProtocolError::Malformed(format!(
                "{} without targetPeerId",
                envelope.kind()
            )));
        }
        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}
