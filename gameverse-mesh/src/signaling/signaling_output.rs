use async_trait::async_trait;
use gameverse_core::{ParticipantId, SignalMessage};

/// Outbound half of the relay channel. Inbound traffic reaches the mesh as
/// [`MeshCommand`](crate::MeshCommand)s.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Identity the relay knows this client by.
    fn local_id(&self) -> &ParticipantId;

    /// Fire-and-forget; delivery failures are logged by the implementation.
    async fn send(&self, message: SignalMessage);
}
