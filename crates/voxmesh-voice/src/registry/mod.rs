//! Peer link registry: one connection per remote participant.
//!
//! The registry owns every peer connection and its remote audio sink. It
//! never holds two links for the same peer: `create` disposes the old link
//! first. Connection callbacks arrive as [`ConnectionEvent`]s tagged with
//! the [`LinkId`] they came from, so events from a disposed link are
//! recognised and dropped.

mod connection;
mod links;
mod types;
#[cfg(feature = "webrtc")]
mod webrtc;

#[cfg(test)]
mod tests;

pub use connection::{AudioSink, ConnectionEvents, PeerConnection, PeerConnectionFactory};
pub use links::PeerLinkRegistry;
pub use types::{
    ConnectionEvent, ConnectionEventKind, LinkId, LinkRole, LinkSnapshot, LinkState,
    RegistryNotice, SdpKind, TransportState,
};
#[cfg(feature = "webrtc")]
pub use self::webrtc::{RemoteFrame, WebRtcFactory};
