//! Out-of-band leave notification.
//!
//! On abrupt exit the signaling link may never flush its `leave`, so the
//! server is told through a separate fire-and-forget request as well.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use voxmesh_common::{PeerId, RoomId};
use voxmesh_config::schema::LeaveConfig;

use crate::identity::Identity;

/// Delivers a best-effort leave without waiting for any response.
pub trait LeaveNotifier: Send + Sync {
    fn notify_leave(&self, room: &RoomId, identity: &Identity);
}

/// Does nothing. For deployments without a leave endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLeaveNotifier;

impl LeaveNotifier for NoopLeaveNotifier {
    fn notify_leave(&self, _room: &RoomId, _identity: &Identity) {}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaveRequest<'a> {
    token: Option<&'a str>,
    peer_id: &'a PeerId,
}

/// `POST {url}/{room}/leave` with `{"token", "peerId"}` (`reqwest`).
#[derive(Debug, Clone)]
pub struct HttpLeaveNotifier {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpLeaveNotifier {
    pub fn new(config: &LeaveConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn leave_url(&self, room: &RoomId) -> String {
        format!("{}/{}/leave", self.base_url, room)
    }
}

impl LeaveNotifier for HttpLeaveNotifier {
    fn notify_leave(&self, room: &RoomId, identity: &Identity) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(room = %room, "No async runtime, leave notification skipped");
            return;
        };

        let url = self.leave_url(room);
        let request = self.client.post(&url).timeout(self.timeout).json(&LeaveRequest {
            token: identity.access_token.as_deref(),
            peer_id: &identity.peer_id,
        });

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) => debug!(url = %url, status = %response.status(), "Leave notification sent"),
                Err(e) => debug!(url = %url, error = %e, "Leave notification failed"),
            }
        });
    }
}
