//! Tests for local media acquisition and release.

use std::time::Duration;

use bytes::Bytes;
use voxmesh_common::MediaError;

use super::*;

fn frame() -> AudioFrame {
    AudioFrame {
        data: Bytes::from_static(&[0xf8, 0xff, 0xfe]),
        duration: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn acquires_default_device() {
    let source = PushSource::new(vec!["Built-in Microphone".into(), "USB Headset".into()]);
    let stream = source.acquire(&AudioConstraints::default()).await.unwrap();
    assert_eq!(stream.tracks().len(), 1);
    assert_eq!(stream.audio_track().unwrap().label(), "Built-in Microphone");
}

#[tokio::test]
async fn acquires_named_device() {
    let source = PushSource::new(vec!["Built-in Microphone".into(), "USB Headset".into()]);
    let constraints = AudioConstraints {
        device: "USB Headset".into(),
        ..AudioConstraints::default()
    };
    let stream = source.acquire(&constraints).await.unwrap();
    assert_eq!(stream.audio_track().unwrap().label(), "USB Headset");
}

#[tokio::test]
async fn missing_device_is_device_not_found() {
    let source = PushSource::new(vec![]);
    let err = source.acquire(&AudioConstraints::default()).await.unwrap_err();
    assert_eq!(err, MediaError::DeviceNotFound);

    let source = PushSource::new(vec!["Built-in Microphone".into()]);
    let constraints = AudioConstraints {
        device: "Studio Mic".into(),
        ..AudioConstraints::default()
    };
    let err = source.acquire(&constraints).await.unwrap_err();
    assert_eq!(err, MediaError::DeviceNotFound);
}

#[tokio::test]
async fn denied_permission_is_reported() {
    let source = PushSource::new(vec!["Built-in Microphone".into()]);
    source.set_permitted(false);
    let err = source.acquire(&AudioConstraints::default()).await.unwrap_err();
    assert_eq!(err, MediaError::PermissionDenied);
}

#[tokio::test]
async fn dropping_stream_releases_device() {
    let source = PushSource::new(vec!["Built-in Microphone".into()]);
    let stream = source.acquire(&AudioConstraints::default()).await.unwrap();
    let track = stream.audio_track().unwrap().clone();
    assert!(source.current_track().await.is_some());

    drop(stream);
    assert!(track.is_stopped());
    assert!(source.current_track().await.is_none());
}

#[tokio::test]
async fn disabled_track_drops_frames() {
    let track = LocalAudioTrack::new("mic");
    let mut rx = track.subscribe();

    assert!(track.push(frame()));
    assert_eq!(rx.recv().await.unwrap(), frame());

    track.set_enabled(false);
    assert!(!track.push(frame()));

    track.set_enabled(true);
    assert!(track.push(frame()));
}

#[tokio::test]
async fn stopped_track_drops_frames_and_wakes_waiters() {
    let track = std::sync::Arc::new(LocalAudioTrack::new("mic"));
    let _rx = track.subscribe();

    let waiter = {
        let track = track.clone();
        tokio::spawn(async move { track.stopped().await })
    };
    track.stop();
    waiter.await.unwrap();
    assert!(!track.push(frame()));
}

#[test]
fn stream_set_enabled_toggles_track() {
    let stream = LocalStream::new(vec![std::sync::Arc::new(LocalAudioTrack::new("mic"))]);
    assert!(stream.is_enabled());
    stream.set_enabled(false);
    assert!(!stream.is_enabled());
    assert!(!stream.audio_track().unwrap().is_stopped());
}
