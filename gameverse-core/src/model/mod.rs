mod ice;
mod media;
mod participant;
mod room;
mod session;
mod signaling;

pub use ice::{IceCandidate, IceServerConfig};
pub use media::{
    AudioConstraints, EncodingParameters, MediaConstraints, MediaTier, TrackKind,
    VideoConstraints,
};
pub use participant::{Participant, ParticipantId};
pub use room::RoomId;
pub use session::{SdpKind, SessionDescription};
pub use signaling::SignalMessage;
