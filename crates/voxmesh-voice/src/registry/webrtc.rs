//! WebRTC media backend (webrtc-rs).
//!
//! Local frames are forwarded into one Opus `TrackLocalStaticSample` per
//! connection. Remote RTP payloads are published as [`RemoteFrame`]s for
//! the application's decoder and playback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use voxmesh_common::{NegotiationError, PeerId};
use voxmesh_config::schema::IceConfig;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::connection::{AudioSink, ConnectionEvents, PeerConnection, PeerConnectionFactory};
use super::types::{SdpKind, TransportState};
use crate::media::LocalAudioTrack;
use crate::protocol::IceCandidate;

/// One Opus payload received from a remote participant.
#[derive(Debug, Clone)]
pub struct RemoteFrame {
    pub peer_id: PeerId,
    pub payload: Bytes,
}

pub struct WebRtcFactory {
    api: API,
    rtc_config: RTCConfiguration,
    remote_tx: broadcast::Sender<RemoteFrame>,
}

impl WebRtcFactory {
    pub fn new(ice: &IceConfig) -> Result<Self, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| NegotiationError::Connection(format!("failed to register codecs: {e}")))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
            NegotiationError::Connection(format!("failed to register interceptors: {e}"))
        })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice
                .servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let (remote_tx, _) = broadcast::channel(1024);
        Ok(Self {
            api,
            rtc_config,
            remote_tx,
        })
    }

    /// Remote audio from every peer, tagged with its origin.
    pub fn subscribe_remote(&self) -> broadcast::Receiver<RemoteFrame> {
        self.remote_tx.subscribe()
    }
}

#[async_trait]
impl PeerConnectionFactory for WebRtcFactory {
    async fn create(
        &self,
        events: ConnectionEvents,
    ) -> Result<Box<dyn PeerConnection>, NegotiationError> {
        let pc = self
            .api
            .new_peer_connection(self.rtc_config.clone())
            .await
            .map_err(|e| NegotiationError::Connection(format!("failed to create peer connection: {e}")))?;
        let pc = Arc::new(pc);
        let stop = CancellationToken::new();

        let ice_events = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => events.ice_candidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }),
                    Err(e) => warn!(peer = %events.peer_id(), error = %e, "Unserializable ICE candidate"),
                }
            })
        }));

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let state = match s {
                RTCPeerConnectionState::Connecting => TransportState::Connecting,
                RTCPeerConnectionState::Connected => TransportState::Connected,
                RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                RTCPeerConnectionState::Failed => TransportState::Failed,
                RTCPeerConnectionState::Closed => TransportState::Closed,
                _ => TransportState::New,
            };
            state_events.state(state);
            Box::pin(async {})
        }));

        let track_events = events.clone();
        let remote_tx = self.remote_tx.clone();
        let track_stop = stop.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                let remote_tx = remote_tx.clone();
                let stop = track_stop.child_token();
                Box::pin(async move {
                    if track.kind() != RTPCodecType::Audio {
                        return;
                    }
                    let sink = Arc::new(RtpAudioSink {
                        muted: AtomicBool::new(false),
                        stop,
                    });
                    events.track(sink.clone());
                    tokio::spawn(read_remote_track(track, sink, events.peer_id().clone(), remote_tx));
                })
            },
        ));

        Ok(Box::new(WebRtcConnection {
            pc,
            peer_id: events.peer_id().clone(),
            stop,
            local_tracks: Mutex::new(Vec::new()),
        }))
    }
}

async fn read_remote_track(
    track: Arc<TrackRemote>,
    sink: Arc<RtpAudioSink>,
    peer_id: PeerId,
    remote_tx: broadcast::Sender<RemoteFrame>,
) {
    loop {
        tokio::select! {
            _ = sink.stop.cancelled() => break,
            read = track.read_rtp() => match read {
                Ok((packet, _attributes)) => {
                    if packet.payload.is_empty() || sink.muted.load(Ordering::SeqCst) {
                        continue;
                    }
                    let _ = remote_tx.send(RemoteFrame {
                        peer_id: peer_id.clone(),
                        payload: packet.payload,
                    });
                }
                Err(e) => {
                    debug!(peer = %peer_id, error = %e, "Remote track ended");
                    break;
                }
            },
        }
    }
}

struct RtpAudioSink {
    muted: AtomicBool,
    stop: CancellationToken,
}

impl AudioSink for RtpAudioSink {
    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.stop.cancel();
    }
}

struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
    peer_id: PeerId,
    stop: CancellationToken,
    local_tracks: Mutex<Vec<Arc<TrackLocalStaticSample>>>,
}

fn description(kind: SdpKind, sdp: &str) -> Result<RTCSessionDescription, NegotiationError> {
    let parsed = match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp.to_string()),
        SdpKind::Answer => RTCSessionDescription::answer(sdp.to_string()),
    };
    parsed.map_err(|e| NegotiationError::MalformedSdp(e.to_string()))
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    async fn add_track(&self, track: Arc<LocalAudioTrack>) -> Result<(), NegotiationError> {
        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                rtcp_feedback: vec![],
            },
            "audio".to_owned(),
            format!("voxmesh-{}", track.id()),
        ));

        self.pc
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| NegotiationError::Connection(format!("failed to add track: {e}")))?;
        self.local_tracks.lock().await.push(Arc::clone(&local));

        let stop = self.stop.clone();
        let peer_id = self.peer_id.clone();
        tokio::spawn(async move {
            let mut frames = track.subscribe();
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = track.stopped() => break,
                    frame = frames.recv() => match frame {
                        Ok(frame) => {
                            let sample = Sample {
                                data: frame.data,
                                duration: frame.duration,
                                ..Default::default()
                            };
                            if let Err(e) = local.write_sample(&sample).await {
                                debug!(peer = %peer_id, error = %e, "Failed to write sample");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(peer = %peer_id, skipped, "Local audio forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, NegotiationError> {
        self.pc
            .create_offer(None)
            .await
            .map(|d| d.sdp)
            .map_err(|e| NegotiationError::Connection(format!("failed to create offer: {e}")))
    }

    async fn create_answer(&self) -> Result<String, NegotiationError> {
        self.pc
            .create_answer(None)
            .await
            .map(|d| d.sdp)
            .map_err(|e| NegotiationError::Connection(format!("failed to create answer: {e}")))
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: &str) -> Result<(), NegotiationError> {
        self.pc
            .set_local_description(description(kind, sdp)?)
            .await
            .map_err(|e| NegotiationError::Connection(format!("failed to set local description: {e}")))
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), NegotiationError> {
        self.pc
            .set_remote_description(description(kind, sdp)?)
            .await
            .map_err(|e| NegotiationError::MalformedSdp(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment.clone(),
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| NegotiationError::IceCandidate(e.to_string()))
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.stop.cancel();
        self.local_tracks.lock().await.clear();
        self.pc
            .close()
            .await
            .map_err(|e| NegotiationError::Connection(format!("failed to close peer connection: {e}")))
    }
}
