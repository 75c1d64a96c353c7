//! In-memory peer connections for tests.
//!
//! Descriptions are fake SDP text. A connection reports a local candidate
//! once its local description is set and reports itself connected once
//! both descriptions are in place. Tests can fail any peer's link on
//! demand to simulate network loss.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voxmesh_common::{NegotiationError, PeerId};

use crate::media::LocalAudioTrack;
use crate::protocol::IceCandidate;
use crate::registry::{
    AudioSink, ConnectionEvents, LinkId, PeerConnection, PeerConnectionFactory, SdpKind,
    TransportState,
};

#[derive(Default)]
pub struct MockSink {
    pub muted: AtomicBool,
    pub detached: AtomicBool,
}

impl AudioSink for MockSink {
    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FactoryState {
    /// Latest connection per remote peer.
    connections: HashMap<PeerId, Arc<MockConnection>>,
    created: usize,
}

/// Factory that can be told to misbehave.
#[derive(Clone, Default)]
pub struct MockConnectionFactory {
    state: Arc<Mutex<FactoryState>>,
    /// When set, connections never report connected or emit candidates.
    silent: Arc<AtomicBool>,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn connection(&self, peer: &PeerId) -> Option<Arc<MockConnection>> {
        self.state.lock().unwrap().connections.get(peer).cloned()
    }

    /// Report the latest link to `peer` as failed.
    pub fn fail(&self, peer: &PeerId) {
        if let Some(conn) = self.connection(peer) {
            conn.events.state(TransportState::Failed);
        }
    }

    /// Deliver remote audio on the latest link to `peer`.
    pub fn deliver_track(&self, peer: &PeerId) -> Option<Arc<MockSink>> {
        let conn = self.connection(peer)?;
        let sink = Arc::new(MockSink::default());
        conn.events.track(sink.clone());
        *conn.sink.lock().unwrap() = Some(sink.clone());
        Some(sink)
    }
}

#[async_trait]
impl PeerConnectionFactory for MockConnectionFactory {
    async fn create(
        &self,
        events: ConnectionEvents,
    ) -> Result<Box<dyn PeerConnection>, NegotiationError> {
        let conn = Arc::new(MockConnection {
            events: events.clone(),
            silent: self.silent.load(Ordering::SeqCst),
            tracks: AtomicUsize::new(0),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            candidates: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            sink: Mutex::new(None),
        });
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        state
            .connections
            .insert(events.peer_id().clone(), Arc::clone(&conn));
        Ok(Box::new(SharedConnection(conn)))
    }
}

pub struct MockConnection {
    events: ConnectionEvents,
    silent: bool,
    pub tracks: AtomicUsize,
    local: Mutex<Option<SdpKind>>,
    remote: Mutex<Option<SdpKind>>,
    pub candidates: AtomicUsize,
    pub closed: AtomicBool,
    sink: Mutex<Option<Arc<MockSink>>>,
}

impl MockConnection {
    pub fn link_id(&self) -> LinkId {
        self.events.link_id()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn fake_sdp(&self, kind: &str) -> String {
        format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=voxmesh {kind}\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n",
            self.events.link_id()
        )
    }

    fn maybe_connected(&self) {
        if self.silent {
            return;
        }
        let both = self.local.lock().unwrap().is_some() && self.remote.lock().unwrap().is_some();
        if both {
            // Let the session's serialized loop pick these up after the
            // current step.
            let events = self.events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                events.state(TransportState::Connected);
            });
        }
    }
}

struct SharedConnection(Arc<MockConnection>);

#[async_trait]
impl PeerConnection for SharedConnection {
    async fn add_track(&self, _track: Arc<LocalAudioTrack>) -> Result<(), NegotiationError> {
        self.0.tracks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, NegotiationError> {
        Ok(self.0.fake_sdp("offer"))
    }

    async fn create_answer(&self) -> Result<String, NegotiationError> {
        if *self.0.remote.lock().unwrap() != Some(SdpKind::Offer) {
            return Err(NegotiationError::Connection("no remote offer".into()));
        }
        Ok(self.0.fake_sdp("answer"))
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: &str) -> Result<(), NegotiationError> {
        if !sdp.starts_with("v=0") {
            return Err(NegotiationError::MalformedSdp("missing version line".into()));
        }
        *self.0.local.lock().unwrap() = Some(kind);
        if !self.0.silent {
            self.0
                .events
                .ice_candidate(IceCandidate::new(format!(
                    "candidate:{} 1 udp 2122260223 127.0.0.1 50000 typ host",
                    self.0.events.link_id()
                )));
        }
        self.0.maybe_connected();
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), NegotiationError> {
        if !sdp.starts_with("v=0") {
            return Err(NegotiationError::MalformedSdp("missing version line".into()));
        }
        *self.0.remote.lock().unwrap() = Some(kind);
        self.0.maybe_connected();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError> {
        if candidate.candidate.is_empty() {
            return Err(NegotiationError::IceCandidate("empty candidate".into()));
        }
        self.0.candidates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.0.closed.store(true, Ordering::SeqCst);
        if let Some(sink) = self.0.sink.lock().unwrap().take() {
            sink.detach();
        }
        Ok(())
    }
}

/// Records out-of-band leave notifications.
#[derive(Default)]
pub struct RecordingLeaveNotifier {
    pub calls: Mutex<Vec<(voxmesh_common::RoomId, PeerId)>>,
}

impl crate::teardown::LeaveNotifier for RecordingLeaveNotifier {
    fn notify_leave(&self, room: &voxmesh_common::RoomId, identity: &crate::identity::Identity) {
        self.calls
            .lock()
            .unwrap()
            .push((room.clone(), identity.peer_id.clone()));
    }
}
