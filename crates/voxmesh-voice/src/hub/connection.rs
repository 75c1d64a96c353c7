use tokio::sync::mpsc;
use tracing::warn;

use super::store::{MemberTicket, RoomHub};
use crate::protocol::{SignalBody, SignalEnvelope};

/// One client connection's view of the hub.
///
/// Nothing is routed until the client has sent its `join`.
pub struct HubConnection {
    hub: RoomHub,
    tx: mpsc::Sender<SignalEnvelope>,
    ticket: Option<MemberTicket>,
}

impl HubConnection {
    /// `tx` receives every envelope routed to this client.
    pub fn new(hub: RoomHub, tx: mpsc::Sender<SignalEnvelope>) -> Self {
        Self {
            hub,
            tx,
            ticket: None,
        }
    }

    pub fn ticket(&self) -> Option<&MemberTicket> {
        self.ticket.as_ref()
    }

    pub async fn handle(&mut self, envelope: SignalEnvelope) {
        if let SignalBody::Join { display_name } = &envelope.body {
            if let Some(old) = self.ticket.take() {
                if old.room_id != envelope.room_id || old.peer_id != envelope.sender_peer_id {
                    self.hub.disconnect(&old).await;
                }
            }
            let ticket = self
                .hub
                .join(
                    &envelope.room_id,
                    &envelope.sender_peer_id,
                    display_name,
                    self.tx.clone(),
                )
                .await;
            self.ticket = Some(ticket);
            return;
        }

        match &self.ticket {
            Some(ticket) => {
                let leaving = matches!(envelope.body, SignalBody::Leave);
                self.hub.route(ticket, envelope).await;
                if leaving {
                    self.ticket = None;
                }
            }
            None => {
                warn!(
                    sender = %envelope.sender_peer_id,
                    kind = envelope.kind(),
                    "Envelope before join, dropping"
                );
            }
        }
    }

    /// The underlying connection is gone.
    pub async fn close(self) {
        if let Some(ticket) = self.ticket {
            self.hub.disconnect(&ticket).await;
        }
    }
}
