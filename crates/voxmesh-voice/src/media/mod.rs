//! Local audio capture.
//!
//! A [`MediaSource`] hands out a [`LocalStream`] when the session connects.
//! The stream is a scoped acquisition: dropping or stopping it releases the
//! device on every disconnect path.

mod source;
mod types;

#[cfg(test)]
mod tests;

pub use source::{MediaSource, PushSource};
pub use types::{AudioConstraints, AudioFrame, LocalAudioTrack, LocalStream};
