use crate::media::MediaAcquisition;
use gameverse_core::{IceCandidate, ParticipantId, RoomId, SessionDescription, SignalMessage};

pub const MESH_COMMAND_CAPACITY: usize = 256;

/// Input to the mesh coordinator: relay traffic, UI requests and results of
/// work the coordinator spawned.
#[derive(Debug)]
pub enum MeshCommand {
    /// The relay accepted our join.
    Joined { room_id: RoomId },

    JoinFailed { reason: String },

    /// Full participant listing.
    Roster(Vec<ParticipantId>),

    ParticipantJoined {
        participant_id: ParticipantId,
        display_name: Option<String>,
    },

    ParticipantLeft { participant_id: ParticipantId },

    Offer {
        from: ParticipantId,
        description: SessionDescription,
    },

    Answer {
        from: ParticipantId,
        description: SessionDescription,
    },

    IceCandidate {
        from: ParticipantId,
        candidate: IceCandidate,
    },

    /// Local media acquisition finished. `epoch` ties the result to the
    /// acquisition that produced it.
    MediaReady {
        epoch: u64,
        acquisition: MediaAcquisition,
    },

    Reconnect,

    Leave,
}

impl MeshCommand {
    /// Maps an inbound relay frame. Frames addressed to someone else and
    /// client-to-relay requests yield `None`.
    pub fn from_signal(message: SignalMessage, local_id: &ParticipantId) -> Option<Self> {
        if message.target().is_some_and(|target| target != local_id) {
            return None;
        }

        let command = match message {
            SignalMessage::Joined { room_id } => MeshCommand::Joined { room_id },
            SignalMessage::JoinError { reason } => MeshCommand::JoinFailed { reason },
            SignalMessage::AllUsers { users } => MeshCommand::Roster(users),
            SignalMessage::UserJoined {
                participant_id,
                display_name,
            } => MeshCommand::ParticipantJoined {
                participant_id,
                display_name,
            },
            SignalMessage::UserLeft { participant_id } => {
                MeshCommand::ParticipantLeft { participant_id }
            }
            SignalMessage::Offer {
                from, description, ..
            } => MeshCommand::Offer { from, description },
            SignalMessage::Answer {
                from, description, ..
            } => MeshCommand::Answer { from, description },
            SignalMessage::IceCandidate {
                from, candidate, ..
            } => MeshCommand::IceCandidate { from, candidate },
            SignalMessage::JoinRoom { .. }
            | SignalMessage::RoomUsers { .. }
            | SignalMessage::LeaveRoom { .. } => return None,
        };
        Some(command)
    }
}
