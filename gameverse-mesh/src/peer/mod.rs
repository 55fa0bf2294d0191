mod candidate_buffer;
mod peer_connection;
mod peer_context;
mod peer_state;
mod stats_history;

pub use candidate_buffer::CandidateBuffer;
pub use peer_connection::PeerConnection;
pub use peer_context::PeerContext;
pub use peer_state::{NegotiationRole, PeerState};
pub use stats_history::StatsHistory;
