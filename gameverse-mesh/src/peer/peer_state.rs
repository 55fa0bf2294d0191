use crate::transport::LinkState;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationRole {
    Offering,
    Answering,
}

/// Lifecycle of one peer connection.
///
/// A connection is `Idle` from construction until its first negotiation
/// step; transport reports cannot move it out of `Idle` except to a terminal
/// state.
/// `Failed` and `Closed` are terminal for the instance. A failed participant
/// is retried by the next reconcile, which builds a fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    Idle,
    Negotiating(NegotiationRole),
    Connected,
    Degraded,
    Failed,
    Closed,
}

impl PeerState {
    /// Counts as a connection reconcile should leave alone.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            PeerState::Negotiating(_) | PeerState::Connected | PeerState::Degraded
        )
    }

    /// Counts against connectivity health.
    pub fn is_down(&self) -> bool {
        matches!(
            self,
            PeerState::Failed | PeerState::Closed | PeerState::Degraded
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerState::Failed | PeerState::Closed)
    }

    /// Next state after the transport reports `link`.
    pub fn on_link(self, link: LinkState) -> PeerState {
        match (self, link) {
            (PeerState::Closed, _) => PeerState::Closed,
            (_, LinkState::Closed) => PeerState::Closed,
            (_, LinkState::Failed) => PeerState::Failed,
            (PeerState::Failed, _) => PeerState::Failed,
            (
                PeerState::Negotiating(_) | PeerState::Connected | PeerState::Degraded,
                LinkState::Connected,
            ) => PeerState::Connected,
            (PeerState::Connected, LinkState::Disconnected) => PeerState::Degraded,
            (state, _) => state,
        }
    }
}
