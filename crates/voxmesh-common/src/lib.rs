pub mod errors;
pub mod events;
pub mod id;

pub use errors::{
    ConfigError, MediaError, NegotiationError, ProtocolError, SignalingError, VoxError,
};
pub use events::{MembershipBus, MembershipEvent};
pub use id::{new_id, PeerId, RoomId};

pub type Result<T> = std::result::Result<T, VoxError>;
