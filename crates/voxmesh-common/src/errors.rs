use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failure to capture the local microphone.
///
/// The display strings are shown to the user as-is, so each one tells the
/// user what to do next.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("microphone access denied: enable microphone permissions in your system settings, then try again")]
    PermissionDenied,

    #[error("no microphone found: connect a microphone and try again")]
    DeviceNotFound,

    #[error("failed to access microphone: {0}")]
    Other(String),
}

/// A signaling frame that could not be turned into an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("envelope has no \"type\" field")]
    MissingType,

    #[error("unknown envelope type: {0}")]
    UnknownType(String),

    #[error("malformed envelope: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalingError {
    #[error("signaling connect failed: {0}")]
    ConnectFailed(String),

    #[error("signaling connect timed out after {0}s")]
    Timeout(u64),

    #[error("signaling link closed")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Per-peer negotiation failure. Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("malformed session description: {0}")]
    MalformedSdp(String),

    #[error("failed to apply ICE candidate: {0}")]
    IceCandidate(String),

    #[error("{operation} not valid in link state {state}")]
    WrongState {
        operation: &'static str,
        state: String,
    },

    #[error("peer connection error: {0}")]
    Connection(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VoxError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("voice session is not running")]
    SessionClosed,

    #[error("already connected to room {0}")]
    AlreadyConnected(String),
}
