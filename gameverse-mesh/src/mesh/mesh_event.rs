use crate::peer::PeerState;
use crate::transport::RemoteTrack;
use gameverse_core::{EncodingParameters, MediaTier, ParticipantId, RoomId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Notifications for the UI layer.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    Joined { room_id: RoomId },

    JoinFailed { reason: String },

    PeerStateChanged {
        participant_id: ParticipantId,
        state: PeerState,
    },

    RemoteTrackAdded {
        participant_id: ParticipantId,
        track: RemoteTrack,
    },

    /// Every inbound track of the participant is gone.
    RemoteStreamRemoved { participant_id: ParticipantId },

    /// New outbound video limits. Whoever encodes frames for the local video
    /// track should honour them.
    EncodingChanged {
        participant_id: ParticipantId,
        params: EncodingParameters,
    },

    ConnectivityChanged { degraded: bool },

    /// Media was acquired below the first requested tier.
    MediaFallback { tier: MediaTier, failures: Vec<String> },

    Left,
}

/// Snapshot published after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshStatus {
    pub joined: bool,
    pub connectivity_degraded: bool,
    /// `None` while media is being acquired.
    pub media_tier: Option<MediaTier>,
    pub peers: BTreeMap<ParticipantId, PeerState>,
}

impl MeshStatus {
    pub fn connected_peers(&self) -> usize {
        self.peers
            .values()
            .filter(|s| **s == PeerState::Connected)
            .count()
    }
}
