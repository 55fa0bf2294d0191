use crate::transport::PeerTransport;
use gameverse_core::{IceCandidate, ParticipantId};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Holds remote candidates that arrived before their connection had a remote
/// description, keyed by participant and kept in arrival order.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: HashMap<ParticipantId, VecDeque<IceCandidate>>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, participant_id: &ParticipantId, candidate: IceCandidate) {
        self.pending
            .entry(participant_id.clone())
            .or_default()
            .push_back(candidate);
    }

    /// Applies every buffered candidate for `participant_id` in arrival order
    /// and empties the queue. Returns how many were applied successfully.
    pub async fn drain(
        &mut self,
        participant_id: &ParticipantId,
        transport: &dyn PeerTransport,
    ) -> usize {
        let Some(queue) = self.pending.remove(participant_id) else {
            return 0;
        };

        let total = queue.len();
        let mut applied = 0;
        for candidate in queue {
            match transport.add_ice_candidate(candidate).await {
                Ok(()) => applied += 1,
                Err(e) => warn!(
                    "Skipping buffered ICE candidate for {}: {:?}",
                    participant_id, e
                ),
            }
        }
        debug!(
            "Drained {}/{} buffered candidates for {}",
            applied, total, participant_id
        );
        applied
    }

    pub fn discard(&mut self, participant_id: &ParticipantId) {
        self.pending.remove(participant_id);
    }

    pub fn len(&self, participant_id: &ParticipantId) -> usize {
        self.pending.get(participant_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.values().all(VecDeque::is_empty)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
