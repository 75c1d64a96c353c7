//! Public handle for one voice session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use voxmesh_common::{MembershipBus, RoomId, VoxError};

use super::actor::{ActorParts, SessionActor};
use super::types::{Command, SessionOptions, SessionSnapshot, VoiceEvent};
use crate::identity::Identity;
use crate::media::MediaSource;
use crate::registry::{PeerConnectionFactory, PeerLinkRegistry};
use crate::signaling::SignalingConnector;
use crate::teardown::LeaveNotifier;

/// Collaborators a session is built from.
pub struct SessionDeps {
    pub media: Arc<dyn MediaSource>,
    pub signaling: Arc<dyn SignalingConnector>,
    pub connections: Arc<dyn PeerConnectionFactory>,
    pub leave_notifier: Arc<dyn LeaveNotifier>,
    /// Where "joined/left voice" facts for other surfaces are published.
    pub membership: Option<MembershipBus>,
}

/// Handle to a voice session running on its own task.
///
/// Methods only send commands to the task. Dropping every handle ends the
/// session as if `disconnect` had been called.
pub struct VoiceSession {
    room: RoomId,
    identity: Identity,
    command_tx: mpsc::Sender<Command>,
    leave_notifier: Arc<dyn LeaveNotifier>,
    joined: Arc<AtomicBool>,
}

impl VoiceSession {
    /// Spawn the session task. Must be called inside a Tokio runtime.
    /// Returns `(session, event_receiver)`.
    pub fn new(
        room: RoomId,
        identity: Identity,
        deps: SessionDeps,
        options: SessionOptions,
    ) -> (Self, mpsc::Receiver<VoiceEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (registry, connection_rx) = PeerLinkRegistry::new(deps.connections);
        let joined = Arc::new(AtomicBool::new(false));

        let actor = SessionActor::new(
            ActorParts {
                room: room.clone(),
                identity: identity.clone(),
                options,
                media: deps.media,
                connector: deps.signaling,
                membership: deps.membership,
                registry,
                events: event_tx,
                joined: Arc::clone(&joined),
            },
            timer_tx,
        );
        tokio::spawn(actor.run(command_rx, timer_rx, connection_rx));

        (
            Self {
                room,
                identity,
                command_tx,
                leave_notifier: deps.leave_notifier,
                joined,
            },
            event_rx,
        )
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Acquire the microphone, open signaling, and join the room.
    ///
    /// Microphone failures come back as [`VoxError::Media`] with an
    /// actionable message.
    pub async fn connect(&self) -> Result<(), VoxError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect { reply }).await?;
        rx.await.map_err(|_| VoxError::SessionClosed)?
    }

    /// Leave the room and release every resource. Completes once the
    /// teardown has run.
    pub async fn disconnect(&self) -> Result<(), VoxError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Disconnect { reply }).await?;
        rx.await.map_err(|_| VoxError::SessionClosed)
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), VoxError> {
        self.command(Command::SetMuted(muted)).await
    }

    pub async fn set_deafened(&self, deafened: bool) -> Result<(), VoxError> {
        self.command(Command::SetDeafened(deafened)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, VoxError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| VoxError::SessionClosed)
    }

    /// Abrupt exit. Fires the out-of-band leave and asks the session task
    /// to tear down, without waiting for either.
    pub fn terminate(&self) {
        if self.joined.load(Ordering::SeqCst) {
            self.leave_notifier.notify_leave(&self.room, &self.identity);
        }
        if self.command_tx.try_send(Command::Terminate).is_err() {
            debug!(room = %self.room, "Session task already gone");
        }
    }

    async fn command(&self, command: Command) -> Result<(), VoxError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| VoxError::SessionClosed)
    }
}
