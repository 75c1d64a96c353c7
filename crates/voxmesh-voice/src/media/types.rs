//! Local stream, track, and frame types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use voxmesh_common::new_id;
use voxmesh_config::schema::MediaConfig;

/// Capture settings handed to a [`super::MediaSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConstraints {
    pub device: String,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

impl From<&MediaConfig> for AudioConstraints {
    fn from(config: &MediaConfig) -> Self {
        Self {
            device: config.input_device.clone(),
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
        }
    }
}

/// One encoded (Opus) audio frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub data: Bytes,
    pub duration: Duration,
}

/// The single capture track of a local stream.
///
/// Frames pushed while the track is disabled (muted) or stopped are dropped
/// at the source, so every peer link sees silence at once.
pub struct LocalAudioTrack {
    id: String,
    label: String,
    enabled: AtomicBool,
    stop: CancellationToken,
    frames: broadcast::Sender<AudioFrame>,
}

impl std::fmt::Debug for LocalAudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAudioTrack")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl LocalAudioTrack {
    pub fn new(label: impl Into<String>) -> Self {
        let (frames, _) = broadcast::channel(64);
        Self {
            id: new_id(),
            label: label.into(),
            enabled: AtomicBool::new(true),
            stop: CancellationToken::new(),
            frames,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Feed one captured frame. Returns whether it reached any consumer.
    pub fn push(&self, frame: AudioFrame) -> bool {
        if self.is_stopped() || !self.is_enabled() {
            return false;
        }
        self.frames.send(frame).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AudioFrame> {
        self.frames.subscribe()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Release the underlying device. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Resolves once the track has been stopped.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }
}

/// Captured local media for one session.
#[derive(Debug)]
pub struct LocalStream {
    tracks: Vec<Arc<LocalAudioTrack>>,
}

impl LocalStream {
    pub fn new(tracks: Vec<Arc<LocalAudioTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<LocalAudioTrack>] {
        &self.tracks
    }

    pub fn audio_track(&self) -> Option<&Arc<LocalAudioTrack>> {
        self.tracks.first()
    }

    /// Toggle the audio track without re-acquiring the device.
    pub fn set_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.audio_track().is_some_and(|t| t.is_enabled())
    }

    /// Stop every underlying hardware track.
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl Drop for LocalStream {
    fn drop(&mut self) {
        self.stop();
    }
}
