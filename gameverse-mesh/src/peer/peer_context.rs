use crate::MeshConfig;
use crate::signaling::SignalingOutput;
use crate::transport::{TransportEvent, TransportFactory};
use gameverse_core::{
    EncodingParameters, IceCandidate, ParticipantId, SessionDescription, SignalMessage, TrackKind,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared collaborators every peer connection needs. Cheap to clone.
#[derive(Clone)]
pub struct PeerContext {
    signaling: Arc<dyn SignalingOutput>,
    factory: Arc<dyn TransportFactory>,
    transport_tx: mpsc::Sender<TransportEvent>,
    video_encoding: EncodingParameters,
    audio_encoding: EncodingParameters,
    stats_history_len: usize,
}

impl PeerContext {
    pub fn new(
        config: &MeshConfig,
        signaling: Arc<dyn SignalingOutput>,
        factory: Arc<dyn TransportFactory>,
        transport_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            signaling,
            factory,
            transport_tx,
            video_encoding: config.video_encoding,
            audio_encoding: config.audio_encoding,
            stats_history_len: config.stats_history_len,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        self.signaling.local_id()
    }

    pub(crate) fn factory(&self) -> &dyn TransportFactory {
        self.factory.as_ref()
    }

    pub(crate) fn transport_tx(&self) -> mpsc::Sender<TransportEvent> {
        self.transport_tx.clone()
    }

    pub fn default_encoding(&self, kind: TrackKind) -> EncodingParameters {
        match kind {
            TrackKind::Video => self.video_encoding,
            TrackKind::Audio => self.audio_encoding,
        }
    }

    pub fn stats_history_len(&self) -> usize {
        self.stats_history_len
    }

    pub async fn send_offer(&self, target: &ParticipantId, description: SessionDescription) {
        self.signaling
            .send(SignalMessage::Offer {
                target: target.clone(),
                from: self.local_id().clone(),
                description,
            })
            .await;
    }

    pub async fn send_answer(&self, target: &ParticipantId, description: SessionDescription) {
        self.signaling
            .send(SignalMessage::Answer {
                target: target.clone(),
                from: self.local_id().clone(),
                description,
            })
            .await;
    }

    pub async fn send_candidate(&self, target: &ParticipantId, candidate: IceCandidate) {
        self.signaling
            .send(SignalMessage::IceCandidate {
                target: target.clone(),
                from: self.local_id().clone(),
                candidate,
            })
            .await;
    }

    pub async fn send(&self, message: SignalMessage) {
        self.signaling.send(message).await;
    }
}
