//! Signaling links: duplex envelope channels scoped to one room.
//!
//! A link only moves envelopes. It reports open/message/close and never
//! interprets what it carries; retry policy belongs to the session.

mod link;
mod loopback;
mod websocket;


pub use link::{LinkEvent, OpenedLink, SignalingConnector, SignalingLink};
pub use loopback::LoopbackConnector;
pub use websocket::WsConnector;
