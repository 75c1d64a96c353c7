//! Full-mesh peer-to-peer voice rooms.
//!
//! Every participant holds one direct media link to every other
//! participant. A lightweight relay carries only signaling envelopes:
//! joins, leaves, roster snapshots, offers, answers, ICE candidates, and
//! heartbeats. [`VoiceSession`] coordinates the mesh for the local user.

pub mod hub;
pub mod identity;
pub mod media;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod signaling;
pub mod teardown;

#[cfg(test)]
mod testing;

pub use identity::Identity;
pub use media::{AudioConstraints, AudioFrame, LocalAudioTrack, LocalStream, MediaSource, PushSource};
pub use protocol::{IceCandidate, Participant, SignalBody, SignalEnvelope};
pub use registry::{LinkRole, LinkState, PeerConnectionFactory, PeerLinkRegistry};
#[cfg(feature = "webrtc")]
pub use registry::{RemoteFrame, WebRtcFactory};
pub use session::{SessionDeps, SessionOptions, SessionSnapshot, SessionState, VoiceEvent, VoiceSession};
pub use signaling::{LoopbackConnector, SignalingConnector, WsConnector};
pub use teardown::{HttpLeaveNotifier, LeaveNotifier, NoopLeaveNotifier};
