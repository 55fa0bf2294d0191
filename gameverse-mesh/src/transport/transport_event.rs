use gameverse_core::{IceCandidate, ParticipantId, TrackKind};
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Identifies one concrete connection to a participant. The connection id
/// changes every time the coordinator replaces the connection, so events
/// from a replaced connection can be told apart and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerKey {
    pub participant_id: ParticipantId,
    pub connection_id: u64,
}

/// Connectivity as reported by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Media track produced by the remote side. The mesh only keeps a reference;
/// reading RTP from it is up to whoever renders it.
#[derive(Clone)]
pub struct RemoteTrack {
    pub track_id: String,
    pub stream_id: String,
    pub kind: TrackKind,
    /// `None` for transports that do not expose an RTP reader.
    pub remote: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("track_id", &self.track_id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Events the transports emit for the mesh coordinator loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connectivity of the peer connection changed.
    StateChanged { peer: PeerKey, state: LinkState },

    /// A local ICE candidate was gathered and must be relayed to the peer.
    CandidateGenerated { peer: PeerKey, candidate: IceCandidate },

    /// The remote side started sending a track.
    TrackReceived { peer: PeerKey, track: RemoteTrack },
}

impl TransportEvent {
    pub fn peer(&self) -> &PeerKey {
        match self {
            TransportEvent::StateChanged { peer, .. }
            | TransportEvent::CandidateGenerated { peer, .. }
            | TransportEvent::TrackReceived { peer, .. } => peer,
        }
    }
}
