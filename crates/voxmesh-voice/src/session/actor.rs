//! The session task: lifecycle, signaling link ownership, and dispatch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxmesh_common::{MembershipBus, MembershipEvent, PeerId, RoomId, VoxError};

use super::keepalive::{backoff, schedule, spawn_heartbeat};
use super::types::{Command, SessionOptions, SessionSnapshot, SessionState, Timer, VoiceEvent};
use crate::identity::Identity;
use crate::media::{LocalAudioTrack, LocalStream, MediaSource};
use crate::protocol::{Participant, SignalEnvelope};
use crate::registry::{ConnectionEvent, PeerLinkRegistry};
use crate::signaling::{LinkEvent, OpenedLink, SignalingConnector, SignalingLink};

pub(crate) struct SessionActor {
    pub(super) room: RoomId,
    pub(super) identity: Identity,
    pub(super) options: SessionOptions,
    media: Arc<dyn MediaSource>,
    connector: Arc<dyn SignalingConnector>,
    membership: Option<MembershipBus>,
    pub(super) registry: PeerLinkRegistry,
    pub(super) state: SessionState,
    stream: Option<LocalStream>,
    link: Option<Box<dyn SignalingLink>>,
    link_events: Option<mpsc::Receiver<LinkEvent>>,
    /// Remote participants by id, with their display names.
    pub(super) roster: BTreeMap<PeerId, String>,
    muted: bool,
    deafened: bool,
    pub(super) epoch: u64,
    pub(super) tasks: CancellationToken,
    pub(super) timer_tx: mpsc::UnboundedSender<Timer>,
    events: mpsc::Sender<VoiceEvent>,
    joined: Arc<AtomicBool>,
}

pub(crate) struct ActorParts {
    pub room: RoomId,
    pub identity: Identity,
    pub options: SessionOptions,
    pub media: Arc<dyn MediaSource>,
    pub connector: Arc<dyn SignalingConnector>,
    pub membership: Option<MembershipBus>,
    pub registry: PeerLinkRegistry,
    pub events: mpsc::Sender<VoiceEvent>,
    pub joined: Arc<AtomicBool>,
}

impl SessionActor {
    pub(crate) fn new(parts: ActorParts, timer_tx: mpsc::UnboundedSender<Timer>) -> Self {
        Self {
            room: parts.room,
            identity: parts.identity,
            options: parts.options,
            media: parts.media,
            connector: parts.connector,
            membership: parts.membership,
            registry: parts.registry,
            state: SessionState::Disconnected,
            stream: None,
            link: None,
            link_events: None,
            roster: BTreeMap::new(),
            muted: false,
            deafened: false,
            epoch: 0,
            tasks: CancellationToken::new(),
            timer_tx,
            events: parts.events,
            joined: parts.joined,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut timers: mpsc::UnboundedReceiver<Timer>,
        mut connection_events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Terminate) => {
                        self.disconnect("terminated").await;
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.disconnect("session handle dropped").await;
                        break;
                    }
                },
                event = next_link_event(&mut self.link_events) => match event {
                    Some(LinkEvent::Open) => debug!(room = %self.room, "Signaling link open"),
                    Some(LinkEvent::Message(envelope)) => self.handle_envelope(envelope).await,
                    Some(LinkEvent::Closed { reason }) => self.on_link_closed(reason).await,
                    None => self.on_link_closed("link event stream ended".into()).await,
                },
                Some(event) = connection_events.recv() => self.handle_connection_event(event).await,
                Some(timer) = timers.recv() => self.handle_timer(timer).await,
            }
        }
        debug!(room = %self.room, "Session task finished");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                self.disconnect("left").await;
                let _ = reply.send(());
            }
            Command::SetMuted(muted) => self.set_muted(muted),
            Command::SetDeafened(deafened) => self.set_deafened(deafened),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Terminate => self.disconnect("terminated").await,
        }
    }

    async fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Initiate {
                peer,
                epoch,
                attempt,
            } => self.on_initiate_timer(peer, epoch, attempt).await,
            Timer::NegotiationDeadline {
                peer,
                link_id,
                epoch,
                attempt,
            } => self.on_negotiation_deadline(peer, link_id, epoch, attempt).await,
            Timer::Heartbeat { epoch } => self.on_heartbeat(epoch),
            Timer::Rejoin { epoch, attempt } => self.on_rejoin_timer(epoch, attempt).await,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    async fn connect(&mut self) -> Result<(), VoxError> {
        if self.state != SessionState::Disconnected {
            return Err(VoxError::AlreadyConnected(self.room.to_string()));
        }
        self.state = SessionState::Connecting;
        info!(room = %self.room, peer = %self.identity.peer_id, "Connecting to voice room");

        let stream = match self.media.acquire(&self.options.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(room = %self.room, error = %e, "Microphone unavailable");
                self.state = SessionState::Disconnected;
                self.emit(VoiceEvent::Error {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };
        stream.set_enabled(!self.muted);
        self.stream = Some(stream);

        let opened = match self.connector.open(&self.room, &self.identity).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!(room = %self.room, error = %e, "Signaling unavailable");
                self.release_media();
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
        };

        if let Err(e) = self.install_link(opened) {
            warn!(room = %self.room, error = %e, "Failed to announce join");
            self.disconnect("join failed").await;
            return Err(e);
        }

        self.state = SessionState::Connected;
        self.joined.store(true, Ordering::SeqCst);
        info!(room = %self.room, "Joined voice room");
        self.emit(VoiceEvent::Connected {
            room_id: self.room.clone(),
        });
        if let Some(bus) = &self.membership {
            bus.publish(MembershipEvent::Joined {
                room_id: self.room.clone(),
                peer_id: self.identity.peer_id.clone(),
                display_name: self.identity.display_name.clone(),
            });
        }
        Ok(())
    }

    /// Start a new epoch on a freshly opened link: send `join`, start the
    /// heartbeat.
    fn install_link(&mut self, opened: OpenedLink) -> Result<(), VoxError> {
        self.tasks.cancel();
        self.tasks = CancellationToken::new();
        self.epoch += 1;

        let join = SignalEnvelope::join(
            self.room.clone(),
            self.identity.peer_id.clone(),
            &self.identity.display_name,
        );
        opened.link.send(&join)?;
        self.link = Some(opened.link);
        self.link_events = Some(opened.events);

        spawn_heartbeat(
            self.options.heartbeat_interval,
            self.epoch,
            self.tasks.clone(),
            self.timer_tx.clone(),
        );
        Ok(())
    }

    /// Tear everything down. Safe in any state; every step runs even if an
    /// earlier one failed.
    pub(super) async fn disconnect(&mut self, reason: &str) {
        if self.state == SessionState::Disconnected {
            return;
        }
        info!(room = %self.room, reason, "Leaving voice room");

        self.tasks.cancel();
        self.epoch += 1;

        self.release_media();

        let disposed = self.registry.dispose_all().await;
        debug!(room = %self.room, disposed, "Peer links disposed");

        if let Some(link) = self.link.take() {
            let leave = SignalEnvelope::leave(self.room.clone(), self.identity.peer_id.clone());
            if let Err(e) = link.send(&leave) {
                warn!(room = %self.room, error = %e, "Failed to send leave");
            }
            link.close();
        }
        self.link_events = None;

        self.roster.clear();
        self.state = SessionState::Disconnected;
        let was_joined = self.joined.swap(false, Ordering::SeqCst);

        self.emit(VoiceEvent::Disconnected {
            reason: reason.to_string(),
        });
        if let (true, Some(bus)) = (was_joined, &self.membership) {
            bus.publish(MembershipEvent::Left {
                room_id: self.room.clone(),
                peer_id: self.identity.peer_id.clone(),
            });
        }
    }

    fn release_media(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            debug!(room = %self.room, "Microphone released");
        }
    }

    // -----------------------------------------------------------------------
    // Signaling link loss and re-join
    // -----------------------------------------------------------------------

    async fn on_link_closed(&mut self, reason: String) {
        self.link_events = None;
        if let Some(link) = self.link.take() {
            link.close();
        }
        if self.state != SessionState::Connected {
            return;
        }

        self.tasks.cancel();
        self.tasks = CancellationToken::new();
        self.epoch += 1;

        for peer in self.registry.pending_peers() {
            self.registry.dispose(&peer).await;
            self.remove_participant(&peer);
        }

        let rejoining = self.options.rejoin_on_drop && self.options.rejoin_attempts > 0;
        warn!(
            room = %self.room,
            reason = %reason,
            kept = self.registry.len(),
            rejoining,
            "Signaling link lost"
        );
        self.emit(VoiceEvent::SignalingLost {
            reason: reason.clone(),
            rejoining,
        });

        if rejoining {
            self.state = SessionState::Rejoining;
            self.schedule_rejoin(1);
        } else {
            self.disconnect(&format!("signaling lost: {reason}")).await;
        }
    }

    fn schedule_rejoin(&self, attempt: u32) {
        let delay = backoff(
            self.options.reconnect_delay,
            self.options.max_reconnect_delay,
            attempt,
        );
        info!(room = %self.room, attempt, delay_ms = delay.as_millis() as u64, "Re-joining");
        schedule(
            delay,
            Timer::Rejoin {
                epoch: self.epoch,
                attempt,
            },
            self.tasks.clone(),
            self.timer_tx.clone(),
        );
    }

    /// Nothing from the old link is resumed: every link is renegotiated
    /// from the new roster snapshot.
    async fn on_rejoin_timer(&mut self, epoch: u64, attempt: u32) {
        if epoch != self.epoch || self.state != SessionState::Rejoining {
            return;
        }

        let result = match self.connector.open(&self.room, &self.identity).await {
            Ok(opened) => {
                self.registry.dispose_all().await;
                let peers: Vec<PeerId> = self.roster.keys().cloned().collect();
                for peer in peers {
                    self.remove_participant(&peer);
                }
                self.install_link(opened)
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!(room = %self.room, attempt, "Re-joined voice room");
                self.emit(VoiceEvent::Rejoined);
            }
            Err(e) if attempt < self.options.rejoin_attempts => {
                warn!(room = %self.room, attempt, error = %e, "Re-join failed");
                self.schedule_rejoin(attempt + 1);
            }
            Err(e) => {
                warn!(room = %self.room, attempt, error = %e, "Giving up on re-join");
                self.disconnect(&format!("signaling lost: {e}")).await;
            }
        }
    }

    fn on_heartbeat(&self, epoch: u64) {
        if epoch != self.epoch {
            return;
        }
        let Some(link) = &self.link else {
            return;
        };
        let heartbeat = SignalEnvelope::heartbeat(self.room.clone(), self.identity.peer_id.clone());
        if let Err(e) = link.send(&heartbeat) {
            warn!(room = %self.room, error = %e, "Heartbeat send failed");
        }
    }

    // -----------------------------------------------------------------------
    // Local audio controls
    // -----------------------------------------------------------------------

    fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        if let Some(stream) = &self.stream {
            stream.set_enabled(!muted);
        }
        debug!(room = %self.room, muted, "Mute changed");
        self.emit(VoiceEvent::MuteChanged { muted });
    }

    /// Deafening also mutes; un-deafening leaves the microphone muted.
    fn set_deafened(&mut self, deafened: bool) {
        if self.deafened == deafened {
            return;
        }
        self.deafened = deafened;
        self.registry.set_deafened(deafened);
        debug!(room = %self.room, deafened, "Deafen changed");
        self.emit(VoiceEvent::DeafenChanged { deafened });
        if deafened {
            self.set_muted(true);
        }
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    pub(super) fn local_tracks(&self) -> Vec<Arc<LocalAudioTrack>> {
        self.stream
            .as_ref()
            .map(|s| s.tracks().to_vec())
            .unwrap_or_default()
    }

    /// Send over the signaling link if one is open. Failures are logged;
    /// they never tear down established peer links.
    pub(super) fn send(&self, envelope: &SignalEnvelope) -> bool {
        let Some(link) = &self.link else {
            debug!(room = %self.room, kind = envelope.kind(), "No signaling link, envelope dropped");
            return false;
        };
        match link.send(envelope) {
            Ok(()) => true,
            Err(e) => {
                warn!(room = %self.room, kind = envelope.kind(), error = %e, "Signaling send failed");
                false
            }
        }
    }

    pub(super) fn add_participant(&mut self, peer: &PeerId, display_name: &str) {
        let previous = self
            .roster
            .insert(peer.clone(), display_name.to_string());
        if previous.is_none() {
            info!(room = %self.room, peer = %peer, name = display_name, "Participant joined");
            self.emit(VoiceEvent::ParticipantJoined {
                peer_id: peer.clone(),
                display_name: display_name.to_string(),
            });
        }
    }

    pub(super) fn remove_participant(&mut self, peer: &PeerId) {
        if self.roster.remove(peer).is_some() {
            info!(room = %self.room, peer = %peer, "Participant left");
            self.emit(VoiceEvent::ParticipantLeft {
                peer_id: peer.clone(),
            });
        }
    }

    pub(super) fn emit(&self, event: VoiceEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!(room = %self.room, error = %e, "Voice event dropped");
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            room_id: self.room.clone(),
            local_peer_id: self.identity.peer_id.clone(),
            participants: self
                .roster
                .iter()
                .map(|(peer, name)| Participant {
                    peer_id: peer.clone(),
                    display_name: name.clone(),
                })
                .collect(),
            links: self.registry.snapshot(),
            muted: self.muted,
            deafened: self.deafened,
            media_active: self
                .stream
                .as_ref()
                .and_then(|s| s.audio_track())
                .is_some_and(|t| !t.is_stopped()),
        }
    }
}

async fn next_link_event(events: &mut Option<mpsc::Receiver<LinkEvent>>) -> Option<LinkEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
