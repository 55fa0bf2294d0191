use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Opaque participant identity as assigned by the signaling relay.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Random id for clients that pick their own identity before connecting.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote endpoint in the room.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub joined_at: SystemTime,
}

impl Participant {
    /// Participant first seen now. The display name falls back to the id until
    /// the relay reports a better one.
    pub fn new(id: ParticipantId, display_name: Option<String>) -> Self {
        let display_name = display_name.unwrap_or_else(|| id.to_string());
        Self {
            id,
            display_name,
            joined_at: SystemTime::now(),
        }
    }
}
