//! Tests for room membership and envelope routing.

use std::time::Duration;

use tokio::sync::mpsc;
use voxmesh_common::{PeerId, RoomId};

use super::*;
use crate::protocol::{SignalBody, SignalEnvelope};

fn room() -> RoomId {
    RoomId::from("general")
}

fn channel() -> (mpsc::Sender<SignalEnvelope>, mpsc::Receiver<SignalEnvelope>) {
    mpsc::channel(32)
}

fn snapshot_ids(envelope: &SignalEnvelope) -> Vec<String> {
    match &envelope.body {
        SignalBody::RosterSnapshot { participants } => participants
            .iter()
            .map(|p| p.peer_id.as_str().to_string())
            .collect(),
        other => panic!("expected roster snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn first_member_gets_empty_snapshot() {
    let hub = RoomHub::new();
    let (tx, mut rx) = channel();
    hub.join(&room(), &PeerId::from("a1"), "alice", tx).await;

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.sender_peer_id.as_str(), RELAY_PEER_ID);
    assert_eq!(snapshot.target_peer_id, Some(PeerId::from("a1")));
    assert!(snapshot_ids(&snapshot).is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn newcomer_gets_snapshot_and_others_get_join() {
    let hub = RoomHub::new();
    let (a_tx, mut a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    let (c_tx, mut c_rx) = channel();

    hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    hub.join(&room(), &PeerId::from("c3"), "carol", c_tx).await;

    let _ = a_rx.recv().await.unwrap();
    let join_b = a_rx.recv().await.unwrap();
    assert_eq!(join_b.sender_peer_id, PeerId::from("b2"));
    assert!(matches!(join_b.body, SignalBody::Join { ref display_name } if display_name == "bob"));
    let join_c = a_rx.recv().await.unwrap();
    assert_eq!(join_c.sender_peer_id, PeerId::from("c3"));

    assert_eq!(snapshot_ids(&b_rx.recv().await.unwrap()), vec!["a1"]);
    assert_eq!(b_rx.recv().await.unwrap().sender_peer_id, PeerId::from("c3"));

    assert_eq!(snapshot_ids(&c_rx.recv().await.unwrap()), vec!["a1", "b2"]);
    assert!(c_rx.try_recv().is_err());
}

#[tokio::test]
async fn unicast_reaches_only_its_target() {
    let hub = RoomHub::new();
    let (a_tx, mut a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    let (c_tx, mut c_rx) = channel();

    let a = hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    hub.join(&room(), &PeerId::from("c3"), "carol", c_tx).await;
    while a_rx.try_recv().is_ok() {}
    while b_rx.try_recv().is_ok() {}
    while c_rx.try_recv().is_ok() {}

    let offer = SignalEnvelope::offer(room(), PeerId::from("a1"), PeerId::from("b2"), "v=0".into());
    assert!(hub.route(&a, offer.clone()).await);

    assert_eq!(b_rx.recv().await.unwrap(), offer);
    assert!(c_rx.try_recv().is_err());
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn unicast_to_absent_peer_is_dropped() {
    let hub = RoomHub::new();
    let (a_tx, _a_rx) = channel();
    let a = hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;

    let offer = SignalEnvelope::offer(room(), PeerId::from("a1"), PeerId::from("zz"), "v=0".into());
    assert!(!hub.route(&a, offer).await);
}

#[tokio::test]
async fn heartbeat_is_consumed_not_forwarded() {
    let hub = RoomHub::new();
    let (a_tx, _a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    let a = hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    let _ = b_rx.recv().await.unwrap();

    assert!(hub.route(&a, SignalEnvelope::heartbeat(room(), PeerId::from("a1"))).await);
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn leave_is_broadcast_and_member_removed() {
    let hub = RoomHub::new();
    let (a_tx, _a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    let a = hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    let _ = b_rx.recv().await.unwrap();

    hub.route(&a, SignalEnvelope::leave(room(), PeerId::from("a1"))).await;
    let leave = b_rx.recv().await.unwrap();
    assert_eq!(leave.body, SignalBody::Leave);
    assert_eq!(hub.member_count().await, 1);

    // Already gone: no second leave.
    hub.disconnect(&a).await;
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_connection_synthesizes_leave() {
    let hub = RoomHub::new();
    let (a_tx, _a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    let a = hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    let _ = b_rx.recv().await.unwrap();

    hub.disconnect(&a).await;
    let leave = b_rx.recv().await.unwrap();
    assert_eq!(leave.sender_peer_id, PeerId::from("a1"));
    assert_eq!(leave.body, SignalBody::Leave);
}

#[tokio::test]
async fn rejoin_invalidates_old_ticket() {
    let hub = RoomHub::new();
    let (old_tx, _old_rx) = channel();
    let (new_tx, _new_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    let _ = b_rx.recv().await.unwrap();

    let old = hub.join(&room(), &PeerId::from("a1"), "alice", old_tx).await;
    let _ = hub.join(&room(), &PeerId::from("a1"), "alice", new_tx).await;
    while b_rx.try_recv().is_ok() {}

    hub.disconnect(&old).await;
    assert!(b_rx.try_recv().is_err());
    assert_eq!(hub.member_count().await, 2);
    assert!(!hub.route(&old, SignalEnvelope::heartbeat(room(), PeerId::from("a1"))).await);
}

#[tokio::test]
async fn spoofed_sender_is_dropped() {
    let hub = RoomHub::new();
    let (a_tx, _a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    let a = hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    let _ = b_rx.recv().await.unwrap();

    let forged = SignalEnvelope::leave(room(), PeerId::from("zz"));
    assert!(!hub.route(&a, forged).await);
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn reaps_silent_members() {
    let hub = RoomHub::new();
    let (a_tx, _a_rx) = channel();
    let (b_tx, mut b_rx) = channel();
    hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    let b = hub.join(&room(), &PeerId::from("b2"), "bob", b_tx).await;
    let _ = b_rx.recv().await.unwrap();
    hub.route(&b, SignalEnvelope::heartbeat(room(), PeerId::from("b2"))).await;

    let reaped = hub.reap_stale(Duration::from_millis(40)).await;
    assert_eq!(reaped, vec![(room(), PeerId::from("a1"))]);
    assert_eq!(b_rx.recv().await.unwrap().body, SignalBody::Leave);
    assert_eq!(hub.members(&room()).await.len(), 1);
}

#[tokio::test]
async fn empty_rooms_are_removed() {
    let hub = RoomHub::new();
    let (a_tx, _a_rx) = channel();
    let a = hub.join(&room(), &PeerId::from("a1"), "alice", a_tx).await;
    assert_eq!(hub.room_count().await, 1);
    hub.disconnect(&a).await;
    assert_eq!(hub.room_count().await, 0);
}

#[tokio::test]
async fn hub_connection_requires_join_first() {
    let hub = RoomHub::new();
    let (tx, mut rx) = channel();
    let mut conn = HubConnection::new(hub.clone(), tx);

    conn.handle(SignalEnvelope::heartbeat(room(), PeerId::from("a1"))).await;
    assert!(conn.ticket().is_none());
    assert_eq!(hub.member_count().await, 0);

    conn.handle(SignalEnvelope::join(room(), PeerId::from("a1"), "alice")).await;
    assert!(conn.ticket().is_some());
    assert!(matches!(
        rx.recv().await.unwrap().body,
        SignalBody::RosterSnapshot { .. }
    ));

    conn.close().await;
    assert_eq!(hub.member_count().await, 0);
}
