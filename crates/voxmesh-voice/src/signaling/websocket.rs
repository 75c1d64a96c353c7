//! WebSocket signaling link (`tokio-tungstenite`).
//!
//! One text frame per envelope. A writer task drains an unbounded queue so
//! `send` never blocks and frames leave in the order they were queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use voxmesh_common::{ProtocolError, RoomId, SignalingError};
use voxmesh_config::schema::SignalingConfig;

use super::link::{LinkEvent, OpenedLink, SignalingConnector, SignalingLink};
use crate::identity::Identity;
use crate::protocol::SignalEnvelope;

/// Connects to a relay over WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &SignalingConfig) -> Self {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }
}

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn open(&self, room: &RoomId, identity: &Identity) -> Result<OpenedLink, SignalingError> {
        info!(url = %self.url, room = %room, peer = %identity.peer_id, "Opening signaling link");

        let ws_stream = match tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => return Err(SignalingError::ConnectFailed(e.to_string())),
            Err(_elapsed) => return Err(SignalingError::Timeout(self.connect_timeout.as_secs())),
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (event_tx, event_rx) = mpsc::channel(256);
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = ws_write.send(msg).await {
                    debug!(error = %e, "Signaling writer stopped");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_open = Arc::clone(&open);
        let room_id = room.clone();
        tokio::spawn(async move {
            let _ = event_tx.send(LinkEvent::Open).await;

            let reason = loop {
                match ws_read.next().await {
                    Some(Ok(WsMessage::Text(text))) => match SignalEnvelope::decode(&text) {
                        Ok(envelope) => {
                            if event_tx.send(LinkEvent::Message(envelope)).await.is_err() {
                                break "receiver dropped".to_string();
                            }
                        }
                        Err(ProtocolError::UnknownType(kind)) => {
                            warn!(room = %room_id, kind = %kind, "Rejected envelope with unknown type");
                        }
                        Err(e) => {
                            warn!(room = %room_id, error = %e, "Rejected malformed envelope");
                        }
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                    }
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_string(),
                    _ => {}
                }
            };

            reader_open.store(false, Ordering::SeqCst);
            info!(room = %room_id, reason = %reason, "Signaling link closed");
            let _ = event_tx.send(LinkEvent::Closed { reason }).await;
        });

        Ok(OpenedLink {
            link: Box::new(WsLink { out: out_tx, open }),
            events: event_rx,
        })
    }
}

struct WsLink {
    out: mpsc::UnboundedSender<WsMessage>,
    open: Arc<AtomicBool>,
}

impl SignalingLink for WsLink {
    fn send(&self, envelope: &SignalEnvelope) -> Result<(), SignalingError> {
        if !self.is_open() {
            return Err(SignalingError::Closed);
        }
        let json = envelope.encode()?;
        self.out
            .send(WsMessage::Text(json.into()))
            .map_err(|_| SignalingError::Closed)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.out.send(WsMessage::Close(None));
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.out.is_closed()
    }
}
