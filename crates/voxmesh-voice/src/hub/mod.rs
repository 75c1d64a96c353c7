//! Room hub: the relay side of signaling.
//!
//! Tracks who is present in each room, answers a newcomer's `join` with a
//! `roster_snapshot`, fans broadcasts out to everyone else, routes unicasts
//! to their addressee only, and expires members whose heartbeats stop.
//! Used by the relay binary and by the in-process loopback link.

mod connection;
mod store;

#[cfg(test)]
mod tests;

pub use connection::HubConnection;
pub use store::{MemberTicket, RoomHub, RELAY_PEER_ID};
