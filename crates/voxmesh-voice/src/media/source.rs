//! Media sources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};
use voxmesh_common::MediaError;

use super::types::{AudioConstraints, LocalAudioTrack, LocalStream};

/// Acquires the local capture device.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: &AudioConstraints) -> Result<LocalStream, MediaError>;
}

/// Source whose frames are pushed by the embedding application.
///
/// The application owns the actual capture and encoding; it selects one of
/// the advertised devices through [`AudioConstraints::device`] and feeds
/// Opus frames into [`PushSource::current_track`].
pub struct PushSource {
    devices: Vec<String>,
    permitted: AtomicBool,
    current: RwLock<Option<Arc<LocalAudioTrack>>>,
}

impl PushSource {
    pub fn new(devices: Vec<String>) -> Self {
        Self {
            devices,
            permitted: AtomicBool::new(true),
            current: RwLock::new(None),
        }
    }

    /// Record the user's answer to the microphone permission prompt.
    pub fn set_permitted(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::SeqCst);
    }

    /// Track of the most recent live acquisition, if any.
    pub async fn current_track(&self) -> Option<Arc<LocalAudioTrack>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|t| !t.is_stopped())
            .cloned()
    }

    fn select_device(&self, requested: &str) -> Option<&str> {
        if requested == "default" {
            self.devices.first().map(String::as_str)
        } else {
            self.devices
                .iter()
                .find(|d| d.as_str() == requested)
                .map(String::as_str)
        }
    }
}

#[async_trait]
impl MediaSource for PushSource {
    async fn acquire(&self, constraints: &AudioConstraints) -> Result<LocalStream, MediaError> {
        if !self.permitted.load(Ordering::SeqCst) {
            warn!("microphone permission denied");
            return Err(MediaError::PermissionDenied);
        }

        let device = self.select_device(&constraints.device).ok_or_else(|| {
            warn!(device = %constraints.device, "requested microphone not present");
            MediaError::DeviceNotFound
        })?;

        let track = Arc::new(LocalAudioTrack::new(device));
        *self.current.write().await = Some(Arc::clone(&track));

        info!(
            device,
            echo_cancellation = constraints.echo_cancellation,
            noise_suppression = constraints.noise_suppression,
            auto_gain_control = constraints.auto_gain_control,
            "microphone acquired"
        );
        Ok(LocalStream::new(vec![track]))
    }
}
