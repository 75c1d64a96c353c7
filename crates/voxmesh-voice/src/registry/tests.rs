//! Tests for the peer link registry.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use voxmesh_common::{NegotiationError, PeerId};

use super::*;
use crate::media::LocalAudioTrack;
use crate::protocol::IceCandidate;
use crate::testing::MockConnectionFactory;

fn registry() -> (
    PeerLinkRegistry,
    mpsc::UnboundedReceiver<ConnectionEvent>,
    MockConnectionFactory,
) {
    let factory = MockConnectionFactory::new();
    let (registry, events) = PeerLinkRegistry::new(Arc::new(factory.clone()));
    (registry, events, factory)
}

fn bob() -> PeerId {
    PeerId::from("b2")
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("event stream ended")
}

#[tokio::test]
async fn create_attaches_local_tracks() {
    let (mut registry, _events, factory) = registry();
    let tracks = vec![Arc::new(LocalAudioTrack::new("mic"))];

    registry.create(&bob(), LinkRole::Initiator, &tracks).await.unwrap();
    assert_eq!(registry.state(&bob()), Some(LinkState::Idle));
    assert_eq!(registry.role(&bob()), Some(LinkRole::Initiator));
    assert_eq!(factory.connection(&bob()).unwrap().tracks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn create_replaces_existing_link() {
    let (mut registry, _events, factory) = registry();

    let first = registry.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    let old = factory.connection(&bob()).unwrap();
    let second = registry.create(&bob(), LinkRole::Responder, &[]).await.unwrap();

    assert_ne!(first, second);
    assert!(old.is_closed());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.link_id(&bob()), Some(second));
    assert_eq!(registry.role(&bob()), Some(LinkRole::Responder));
}

#[tokio::test]
async fn offer_answer_round_trip_connects_both_sides() {
    let (mut alice, _a_events, _) = registry();
    let (mut bobs, mut b_events, _) = registry();
    let a1 = PeerId::from("a1");

    alice.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    let offer = alice.offer(&bob()).await.unwrap().unwrap();
    assert_eq!(alice.state(&bob()), Some(LinkState::Offering));

    bobs.create(&a1, LinkRole::Responder, &[]).await.unwrap();
    assert!(bobs.apply_remote_description(&a1, SdpKind::Offer, &offer).await.unwrap());
    assert_eq!(bobs.state(&a1), Some(LinkState::Answering));
    let answer = bobs.answer(&a1).await.unwrap().unwrap();
    assert_eq!(bobs.state(&a1), Some(LinkState::Answering));

    assert!(alice.apply_remote_description(&bob(), SdpKind::Answer, &answer).await.unwrap());
    assert_eq!(alice.state(&bob()), Some(LinkState::Connected));
    assert_eq!(alice.len(), 1);
    assert_eq!(alice.connected_count(), 1);

    // Responder side: transport reports connected once both descriptions are set.
    let notice = loop {
        if let Some(notice) = bobs.handle_event(next_event(&mut b_events).await).await {
            if !matches!(notice, RegistryNotice::LocalCandidate { .. }) {
                break notice;
            }
        }
    };
    assert_eq!(notice, RegistryNotice::Connected { peer_id: a1.clone() });
    assert_eq!(bobs.state(&a1), Some(LinkState::Connected));
}

#[tokio::test]
async fn operations_on_missing_link_are_noops() {
    let (mut registry, _events, _) = registry();
    assert_eq!(registry.offer(&bob()).await.unwrap(), None);
    assert!(!registry
        .apply_remote_description(&bob(), SdpKind::Answer, "v=0")
        .await
        .unwrap());
    assert!(!registry
        .apply_local_description(&bob(), SdpKind::Offer, "v=0")
        .await
        .unwrap());
    assert!(!registry
        .apply_remote_ice_candidate(&bob(), &IceCandidate::new("candidate:1"))
        .await
        .unwrap());
}

#[tokio::test]
async fn answer_in_wrong_state_is_rejected() {
    let (mut registry, _events, _) = registry();
    registry.create(&bob(), LinkRole::Responder, &[]).await.unwrap();
    let err = registry
        .apply_remote_description(&bob(), SdpKind::Answer, "v=0")
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::WrongState { .. }));
    assert_eq!(registry.state(&bob()), Some(LinkState::Idle));
}

#[tokio::test]
async fn malformed_sdp_is_rejected() {
    let (mut registry, _events, _) = registry();
    registry.create(&bob(), LinkRole::Responder, &[]).await.unwrap();
    let err = registry
        .apply_remote_description(&bob(), SdpKind::Offer, "garbage")
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::MalformedSdp(_)));
}

#[tokio::test]
async fn dispose_is_idempotent() {
    let (mut registry, _events, factory) = registry();
    registry.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    let conn = factory.connection(&bob()).unwrap();

    assert!(registry.dispose(&bob()).await);
    assert!(!registry.dispose(&bob()).await);
    assert!(conn.is_closed());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn failure_disposes_and_notifies() {
    let (mut registry, mut events, factory) = registry();
    registry.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    factory.fail(&bob());

    let notice = registry.handle_event(next_event(&mut events).await).await;
    assert_eq!(
        notice,
        Some(RegistryNotice::Failed {
            peer_id: bob(),
            state: TransportState::Failed,
        })
    );
    assert!(!registry.contains(&bob()));
}

#[tokio::test]
async fn events_from_replaced_link_are_dropped() {
    let (mut registry, _events, factory) = registry();
    registry.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    let old = factory.connection(&bob()).unwrap();
    registry.create(&bob(), LinkRole::Responder, &[]).await.unwrap();

    // The replaced connection reports failure late.
    let late = ConnectionEvent {
        peer_id: bob(),
        link_id: old.link_id(),
        kind: ConnectionEventKind::State(TransportState::Failed),
    };
    assert_eq!(registry.handle_event(late).await, None);
    assert!(registry.contains(&bob()));
    assert_eq!(registry.role(&bob()), Some(LinkRole::Responder));
}

#[tokio::test]
async fn local_candidates_are_surfaced() {
    let (mut registry, mut events, _) = registry();
    registry.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    registry.offer(&bob()).await.unwrap();

    let notice = registry.handle_event(next_event(&mut events).await).await;
    assert!(matches!(
        notice,
        Some(RegistryNotice::LocalCandidate { ref peer_id, .. }) if *peer_id == bob()
    ));
}

#[tokio::test]
async fn deafen_applies_to_current_and_future_sinks() {
    let (mut registry, mut events, factory) = registry();
    let carol = PeerId::from("c3");
    registry.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    registry.create(&carol, LinkRole::Initiator, &[]).await.unwrap();

    let bob_sink = factory.deliver_track(&bob()).unwrap();
    registry.handle_event(next_event(&mut events).await).await;
    assert!(!bob_sink.muted.load(Ordering::SeqCst));

    registry.set_deafened(true);
    assert!(bob_sink.muted.load(Ordering::SeqCst));

    let carol_sink = factory.deliver_track(&carol).unwrap();
    registry.handle_event(next_event(&mut events).await).await;
    assert!(carol_sink.muted.load(Ordering::SeqCst));

    registry.set_deafened(false);
    assert!(!bob_sink.muted.load(Ordering::SeqCst));
    assert!(!carol_sink.muted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn dispose_detaches_sink() {
    let (mut registry, mut events, factory) = registry();
    registry.create(&bob(), LinkRole::Initiator, &[]).await.unwrap();
    let sink = factory.deliver_track(&bob()).unwrap();
    registry.handle_event(next_event(&mut events).await).await;

    registry.dispose(&bob()).await;
    assert!(sink.detached.load(Ordering::SeqCst));
}

#[tokio::test]
async fn dispose_all_empties_registry() {
    let (mut registry, _events, _) = registry();
    for id in ["b2", "c3", "d4"] {
        registry.create(&PeerId::from(id), LinkRole::Initiator, &[]).await.unwrap();
    }
    assert_eq!(registry.dispose_all().await, 3);
    assert!(registry.is_empty());
    assert!(registry.snapshot().is_empty());
}
