use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use crate::model::session::SessionDescription;
use crate::model::ice::IceCandidate;
use serde::{Deserialize, Serialize};

/// Every frame exchanged with the signaling relay.
///
/// Room messages travel between a client and the relay. `Offer`, `Answer`
/// and `IceCandidate` are addressed to `target` and forwarded verbatim by the
/// relay, which performs no negotiation logic of its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SignalMessage {
    JoinRoom {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    Joined {
        room_id: RoomId,
    },
    JoinError {
        reason: String,
    },
    RoomUsers {
        room_id: RoomId,
    },
    AllUsers {
        users: Vec<ParticipantId>,
    },
    UserJoined {
        participant_id: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    UserLeft {
        participant_id: ParticipantId,
    },
    Offer {
        target: ParticipantId,
        #[serde(alias = "callerId")]
        from: ParticipantId,
        description: SessionDescription,
    },
    Answer {
        target: ParticipantId,
        from: ParticipantId,
        description: SessionDescription,
    },
    IceCandidate {
        target: ParticipantId,
        from: ParticipantId,
        candidate: IceCandidate,
    },
    LeaveRoom {
        room_id: RoomId,
    },
}

impl SignalMessage {
    /// Recipient of a point-to-point message; `None` for room messages.
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            SignalMessage::Offer { target, .. }
            | SignalMessage::Answer { target, .. }
            | SignalMessage::IceCandidate { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::JoinRoom { .. } => "join-room",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::JoinError { .. } => "join-error",
            SignalMessage::RoomUsers { .. } => "room-users",
            SignalMessage::AllUsers { .. } => "all-users",
            SignalMessage::UserJoined { .. } => "user-joined",
            SignalMessage::UserLeft { .. } => "user-left",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice-candidate",
            SignalMessage::LeaveRoom { .. } => "leave-room",
        }
    }
}
