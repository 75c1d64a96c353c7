//! Frame pump for the local microphone track.
//!
//! Without a platform capture backend the app sends Opus comfort-noise
//! frames at the normal 20 ms cadence, which keeps every peer link's RTP
//! flowing and lets the far side confirm the path.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use voxmesh_voice::{AudioFrame, PushSource};

pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// A single Opus DTX frame decoding to silence.
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

pub fn silence_frame() -> AudioFrame {
    AudioFrame {
        data: Bytes::from_static(&OPUS_SILENCE),
        duration: FRAME_DURATION,
    }
}

/// Push a frame into whatever track `source` currently holds, every
/// frame period, until the task is aborted.
pub fn spawn_silence_pump(source: Arc<PushSource>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME_DURATION);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Some(track) = source.current_track().await {
                track.push(silence_frame());
            }
        }
    })
}
