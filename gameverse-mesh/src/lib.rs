//! Full-mesh WebRTC connection manager for a GameVerse room.
//!
//! One [`MeshCoordinator`] task owns a [`PeerConnection`] per remote
//! participant, negotiates through a [`SignalingOutput`], and keeps the mesh
//! converged on the relay's roster. Quality and health monitors run on the
//! coordinator's own interval ticks.

pub mod config;
mod error;
pub mod media;
pub mod mesh;
pub mod monitor;
pub mod peer;
pub mod signaling;
pub mod transport;

pub use config::MeshConfig;
pub use error::MeshError;
pub use media::{LocalMedia, LocalTrack, MediaAcquisition, MediaCapture, SampleTrackCapture};
pub use mesh::{
    MESH_COMMAND_CAPACITY, MeshCommand, MeshCoordinator, MeshEvent, MeshHandle, MeshStatus,
};
pub use peer::{PeerConnection, PeerState};
pub use signaling::{SignalingOutput, WsSignaling};
pub use transport::{PeerTransport, TransportEvent, TransportFactory, WebRtcTransportFactory};
