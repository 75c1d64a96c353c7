//! Mesh negotiation coordinator.
//!
//! A [`VoiceSession`] is a handle to one actor task that owns the roster,
//! the peer link registry, the local stream, and the signaling link. Every
//! input (handle commands, signaling envelopes, connection callbacks,
//! timers) is serialized onto that task.
//!
//! For every pair of participants exactly one side initiates: the one whose
//! [`PeerId`](voxmesh_common::PeerId) sorts lower.

mod actor;
mod handle;
mod keepalive;
mod negotiation;
mod types;


pub use handle::{SessionDeps, VoiceSession};
pub use types::{SessionOptions, SessionSnapshot, SessionState, VoiceEvent};
