use gameverse_core::{Participant, ParticipantId};
use std::collections::BTreeMap;

/// Remote participants in the room as last reported by the relay.
///
/// Until the first full listing arrives the roster is not `synced` and
/// periodic reconciliation leaves the mesh alone.
#[derive(Debug, Default)]
pub struct Roster {
    participants: BTreeMap<ParticipantId, Participant>,
    synced: bool,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the roster with a full listing. Known participants keep their
    /// display name and join time. `local_id` is never stored.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = ParticipantId>, local_id: &ParticipantId) {
        let mut next = BTreeMap::new();
        for id in ids {
            if &id == local_id {
                continue;
            }
            let participant = self
                .participants
                .remove(&id)
                .unwrap_or_else(|| Participant::new(id.clone(), None));
            next.insert(id, participant);
        }
        self.participants = next;
        self.synced = true;
    }

    /// Returns `false` when the participant was already known.
    pub fn insert(&mut self, id: ParticipantId, display_name: Option<String>) -> bool {
        if let Some(existing) = self.participants.get_mut(&id) {
            if let Some(name) = display_name {
                existing.display_name = name;
            }
            return false;
        }
        self.participants
            .insert(id.clone(), Participant::new(id, display_name));
        true
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        self.participants.remove(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.participants.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }
}
