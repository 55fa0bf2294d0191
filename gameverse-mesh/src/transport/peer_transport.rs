use crate::media::LocalTrack;
use crate::transport::{PeerKey, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use gameverse_core::{EncodingParameters, IceCandidate, SessionDescription, TrackKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Cumulative receive counters for the video path of one connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSample {
    pub at: Instant,
    pub packets_lost: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
}

/// One underlying connection to a remote participant.
///
/// Every step of negotiation is asynchronous. Implementations report
/// connectivity, gathered candidates and remote tracks through the
/// [`TransportEvent`] channel they were created with.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, track: &LocalTrack) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn set_encoding(&self, kind: TrackKind, params: EncodingParameters) -> Result<()>;

    /// `Ok(None)` when no video statistics exist yet.
    async fn stats(&self) -> Result<Option<StatsSample>>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        key: PeerKey,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>>;
}
