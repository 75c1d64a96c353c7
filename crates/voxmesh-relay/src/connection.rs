//! Per-connection handler: wait for `join`, register, then forward
//! envelopes both ways.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use voxmesh_voice::hub::{HubConnection, RoomHub};
use voxmesh_voice::protocol::{SignalBody, SignalEnvelope};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept connections forever, one task per client.
pub async fn serve(listener: TcpListener, hub: RoomHub) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, hub).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Handle a single WebSocket connection.
pub async fn handle_connection(ws: WebSocketStream<TcpStream>, addr: SocketAddr, hub: RoomHub) {
    let (mut sink, mut stream) = ws.split();

    // 1. The first envelope must be a join.
    let Some(join) = read_join(&mut stream, addr).await else {
        let _ = sink.send(Message::Close(None)).await;
        return;
    };
    let room = join.room_id.clone();
    let peer = join.sender_peer_id.clone();

    // 2. Register.
    let (tx, mut rx) = mpsc::channel::<SignalEnvelope>(256);
    let mut connection = HubConnection::new(hub, tx);
    connection.handle(join).await;
    tracing::info!(client = %addr, room = %room, peer = %peer, "Client joined");

    // 3. Forwarding loop.
    loop {
        tokio::select! {
            Some(envelope) = rx.recv() => {
                if send_envelope(&mut sink, &envelope).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match SignalEnvelope::decode(&text) {
                        Ok(envelope) => connection.handle(envelope).await,
                        Err(e) => {
                            tracing::warn!(client = %addr, error = %e, "Dropping bad envelope");
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(client = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 4. Cleanup. A client that vanished without `leave` is announced as
    // gone to the rest of its room.
    tracing::info!(client = %addr, room = %room, peer = %peer, "Client disconnected");
    connection.close().await;
}

/// Read the first frame and require it to be a `join` envelope.
async fn read_join(stream: &mut WsStream, addr: SocketAddr) -> Option<SignalEnvelope> {
    let frame = tokio::time::timeout(JOIN_TIMEOUT, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match SignalEnvelope::decode(&text) {
            Ok(envelope) if matches!(envelope.body, SignalBody::Join { .. }) => Some(envelope),
            Ok(envelope) => {
                tracing::warn!(client = %addr, kind = envelope.kind(), "Expected join first");
                None
            }
            Err(e) => {
                tracing::warn!(client = %addr, error = %e, "Invalid join message");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(client = %addr, "Expected text join, got another frame");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(client = %addr, error = %e, "WS error during join");
            None
        }
        Ok(None) => {
            tracing::debug!(client = %addr, "Connection closed before join");
            None
        }
        Err(_) => {
            tracing::warn!(client = %addr, "Join timeout ({}s)", JOIN_TIMEOUT.as_secs());
            None
        }
    }
}

async fn send_envelope(
    sink: &mut WsSink,
    envelope: &SignalEnvelope,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    match envelope.encode() {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::warn!(kind = envelope.kind(), error = %e, "Failed to encode envelope");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use voxmesh_common::{PeerId, RoomId};
    use voxmesh_voice::identity::Identity;
    use voxmesh_voice::signaling::{LinkEvent, OpenedLink, SignalingConnector, WsConnector};

    async fn start_relay() -> (String, RoomHub) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub = RoomHub::new();
        tokio::spawn(serve(listener, hub.clone()));
        (format!("ws://{addr}"), hub)
    }

    async fn join(url: &str, id: &str) -> OpenedLink {
        let connector = WsConnector::new(url, Duration::from_secs(5));
        let identity = Identity::new(PeerId::from(id), format!("user-{id}"));
        let room = RoomId::from("general");
        let opened = connector.open(&room, &identity).await.unwrap();
        opened
            .link
            .send(&SignalEnvelope::join(room, identity.peer_id.clone(), &identity.display_name))
            .unwrap();
        opened
    }

    async fn next_envelope(opened: &mut OpenedLink) -> SignalEnvelope {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), opened.events.recv())
                .await
                .expect("timed out")
                .expect("link closed");
            if let LinkEvent::Message(envelope) = event {
                return envelope;
            }
        }
    }

    #[tokio::test]
    async fn newcomer_gets_snapshot_and_others_get_join() {
        let (url, _hub) = start_relay().await;
        let mut a = join(&url, "a1").await;
        let first = next_envelope(&mut a).await;
        assert!(
            matches!(first.body, SignalBody::RosterSnapshot { ref participants } if participants.is_empty())
        );

        let mut b = join(&url, "b2").await;
        let snapshot = next_envelope(&mut b).await;
        match snapshot.body {
            SignalBody::RosterSnapshot { participants } => {
                assert_eq!(participants.len(), 1);
                assert_eq!(participants[0].peer_id, PeerId::from("a1"));
            }
            other => panic!("expected roster snapshot, got {other:?}"),
        }

        let joined = next_envelope(&mut a).await;
        assert_eq!(joined.sender_peer_id, PeerId::from("b2"));
        assert!(matches!(joined.body, SignalBody::Join { .. }));
    }

    #[tokio::test]
    async fn unicast_reaches_only_its_target() {
        let (url, _hub) = start_relay().await;
        let mut a = join(&url, "a1").await;
        let _ = next_envelope(&mut a).await;
        let mut b = join(&url, "b2").await;
        let _ = next_envelope(&mut b).await;
        let mut c = join(&url, "c3").await;
        let _ = next_envelope(&mut c).await;
        // a sees b and c join, b sees c join.
        let _ = next_envelope(&mut a).await;
        let _ = next_envelope(&mut a).await;
        let _ = next_envelope(&mut b).await;

        a.link
            .send(&SignalEnvelope::offer(
                RoomId::from("general"),
                PeerId::from("a1"),
                PeerId::from("c3"),
                "v=0\r\n".into(),
            ))
            .unwrap();

        let offer = next_envelope(&mut c).await;
        assert_eq!(offer.kind(), "offer");
        assert_eq!(offer.target_peer_id, Some(PeerId::from("c3")));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(b.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_client_is_announced_as_left() {
        let (url, hub) = start_relay().await;
        let mut a = join(&url, "a1").await;
        let _ = next_envelope(&mut a).await;
        let b = join(&url, "b2").await;
        let _ = next_envelope(&mut a).await;

        b.link.close();
        drop(b);

        let left = next_envelope(&mut a).await;
        assert_eq!(left.sender_peer_id, PeerId::from("b2"));
        assert!(matches!(left.body, SignalBody::Leave));
        assert_eq!(hub.member_count().await, 1);
    }

    #[tokio::test]
    async fn first_message_must_be_join() {
        let (url, hub) = start_relay().await;
        let connector = WsConnector::new(url.as_str(), Duration::from_secs(5));
        let identity = Identity::new(PeerId::from("a1"), "alice");
        let mut opened = connector
            .open(&RoomId::from("general"), &identity)
            .await
            .unwrap();
        opened
            .link
            .send(&SignalEnvelope::heartbeat(RoomId::from("general"), PeerId::from("a1")))
            .unwrap();

        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), opened.events.recv())
                .await
                .expect("timed out");
            match event {
                Some(LinkEvent::Closed { .. }) | None => break,
                Some(LinkEvent::Open) => continue,
                Some(LinkEvent::Message(m)) => panic!("unexpected {m:?}"),
            }
        }
        assert_eq!(hub.member_count().await, 0);
    }
}
