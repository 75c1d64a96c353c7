//! In-process signaling link attached directly to a [`RoomHub`].
//!
//! Behaves like a relay connection without sockets: the first envelope a
//! client sends must be its `join`, and dropping the link counts as leaving
//! without saying goodbye.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use voxmesh_common::{PeerId, RoomId, SignalingError};

use super::link::{LinkEvent, OpenedLink, SignalingConnector, SignalingLink};
use crate::hub::{HubConnection, RoomHub};
use crate::identity::Identity;
use crate::protocol::SignalEnvelope;

enum Outbound {
    Envelope(SignalEnvelope),
    Close,
}

#[derive(Clone)]
pub struct LoopbackConnector {
    hub: RoomHub,
    live: Arc<Mutex<HashMap<PeerId, CancellationToken>>>,
    reachable: Arc<AtomicBool>,
}

impl LoopbackConnector {
    pub fn new(hub: RoomHub) -> Self {
        Self {
            hub,
            live: Arc::new(Mutex::new(HashMap::new())),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    /// While unreachable every `open` fails with `ConnectFailed`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Drop a peer's link as if the network went away. Returns whether a
    /// live link existed.
    pub async fn sever(&self, peer: &PeerId) -> bool {
        match self.live.lock().await.remove(peer) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SignalingConnector for LoopbackConnector {
    async fn open(&self, room: &RoomId, identity: &Identity) -> Result<OpenedLink, SignalingError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(SignalingError::ConnectFailed("relay unreachable".into()));
        }

        let (member_tx, mut member_rx) = mpsc::channel::<SignalEnvelope>(256);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::channel(256);
        let open = Arc::new(AtomicBool::new(true));
        let sever = CancellationToken::new();

        if let Some(old) = self
            .live
            .lock()
            .await
            .insert(identity.peer_id.clone(), sever.clone())
        {
            old.cancel();
        }

        let mut connection = HubConnection::new(self.hub.clone(), member_tx);
        let pump_open = Arc::clone(&open);
        let room_id = room.clone();
        let peer_id = identity.peer_id.clone();
        tokio::spawn(async move {
            let _ = event_tx.send(LinkEvent::Open).await;

            let reason = loop {
                tokio::select! {
                    out = out_rx.recv() => match out {
                        Some(Outbound::Envelope(envelope)) => connection.handle(envelope).await,
                        Some(Outbound::Close) | None => break "closed by client".to_string(),
                    },
                    Some(envelope) = member_rx.recv() => {
                        if event_tx.send(LinkEvent::Message(envelope)).await.is_err() {
                            break "receiver dropped".to_string();
                        }
                    }
                    _ = sever.cancelled() => break "connection lost".to_string(),
                }
            };

            pump_open.store(false, Ordering::SeqCst);
            connection.close().await;
            debug!(room = %room_id, peer = %peer_id, reason = %reason, "Loopback link closed");
            let _ = event_tx.send(LinkEvent::Closed { reason }).await;
        });

        Ok(OpenedLink {
            link: Box::new(LoopbackLink { out: out_tx, open }),
            events: event_rx,
        })
    }
}

struct LoopbackLink {
    out: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl SignalingLink for LoopbackLink {
    fn send(&self, envelope: &SignalEnvelope) -> Result<(), SignalingError> {
        if !self.is_open() {
            return Err(SignalingError::Closed);
        }
        self.out
            .send(Outbound::Envelope(envelope.clone()))
            .map_err(|_| SignalingError::Closed)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.out.send(Outbound::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.out.is_closed()
    }
}
