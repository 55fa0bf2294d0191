use anyhow::{Result, bail};
use async_trait::async_trait;
use gameverse_core::{
    EncodingParameters, IceCandidate, ParticipantId, SdpKind, SessionDescription, TrackKind,
};
use gameverse_mesh::LocalTrack;
use gameverse_mesh::transport::{
    LinkState, PeerKey, PeerTransport, StatsSample, TransportEvent, TransportFactory,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Every call the mesh made on a fake transport, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    AddTrack(TrackKind),
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind),
    AddCandidate(String),
    SetEncoding(TrackKind, EncodingParameters),
    Close,
}

/// Knobs for making a fake transport misbehave.
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    pub fail_create: bool,
    pub fail_offer: bool,
    pub fail_remote_description: bool,
    pub fail_encoding: bool,
    /// Candidates containing this text are rejected.
    pub reject_candidates_containing: Option<String>,
}

/// Scripted transport that records calls instead of talking to a network.
pub struct FakeTransport {
    pub key: PeerKey,
    behavior: FakeBehavior,
    events: mpsc::Sender<TransportEvent>,
    calls: Mutex<Vec<TransportCall>>,
    applied_candidates: Mutex<Vec<String>>,
    stats: Mutex<VecDeque<StatsSample>>,
}

impl FakeTransport {
    fn new(key: PeerKey, behavior: FakeBehavior, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            key,
            behavior,
            events,
            calls: Mutex::new(Vec::new()),
            applied_candidates: Mutex::new(Vec::new()),
            stats: Mutex::new(VecDeque::new()),
        }
    }

    async fn record(&self, call: TransportCall) {
        self.calls.lock().await.push(call);
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn applied_candidates(&self) -> Vec<String> {
        self.applied_candidates.lock().await.clone()
    }

    pub async fn close_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| **c == TransportCall::Close)
            .count()
    }

    /// Queues the sample returned by the next `stats()` call.
    pub async fn push_stats(&self, sample: StatsSample) {
        self.stats.lock().await.push_back(sample);
    }

    /// The event the real transport would post when connectivity changes.
    pub fn state_event(&self, state: LinkState) -> TransportEvent {
        TransportEvent::StateChanged {
            peer: self.key.clone(),
            state,
        }
    }

    /// Posts a state change on the channel the coordinator loop reads.
    pub async fn emit_state(&self, state: LinkState) {
        let _ = self.events.send(self.state_event(state)).await;
    }

    pub async fn emit_candidate(&self, candidate: IceCandidate) {
        let _ = self
            .events
            .send(TransportEvent::CandidateGenerated {
                peer: self.key.clone(),
                candidate,
            })
            .await;
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        self.record(TransportCall::AddTrack(track.kind)).await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(TransportCall::CreateOffer).await;
        if self.behavior.fail_offer {
            bail!("scripted offer failure");
        }
        Ok(SessionDescription::offer(format!(
            "offer-{}-{}",
            self.key.participant_id, self.key.connection_id
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(TransportCall::CreateAnswer).await;
        Ok(SessionDescription::answer(format!(
            "answer-{}-{}",
            self.key.participant_id, self.key.connection_id
        )))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.record(TransportCall::SetLocal(description.kind)).await;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.record(TransportCall::SetRemote(description.kind)).await;
        if self.behavior.fail_remote_description {
            bail!("scripted remote description failure");
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(TransportCall::AddCandidate(candidate.candidate.clone()))
            .await;
        if let Some(bad) = &self.behavior.reject_candidates_containing {
            if candidate.candidate.contains(bad.as_str()) {
                bail!("scripted candidate rejection");
            }
        }
        self.applied_candidates.lock().await.push(candidate.candidate);
        Ok(())
    }

    async fn set_encoding(&self, kind: TrackKind, params: EncodingParameters) -> Result<()> {
        self.record(TransportCall::SetEncoding(kind, params)).await;
        if self.behavior.fail_encoding {
            bail!("scripted encoding failure");
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Option<StatsSample>> {
        Ok(self.stats.lock().await.pop_front())
    }

    async fn close(&self) -> Result<()> {
        self.record(TransportCall::Close).await;
        Ok(())
    }
}

/// Hands out [`FakeTransport`]s and keeps every one it created.
#[derive(Default)]
pub struct FakeTransportFactory {
    behavior: Mutex<FakeBehavior>,
    created: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Applies to transports created from now on.
    pub async fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock().await = behavior;
    }

    pub async fn created_count(&self) -> usize {
        self.created.lock().await.len()
    }

    pub async fn transports_for(&self, id: &ParticipantId) -> Vec<Arc<FakeTransport>> {
        self.created
            .lock()
            .await
            .iter()
            .filter(|t| &t.key.participant_id == id)
            .cloned()
            .collect()
    }

    pub async fn latest_for(&self, id: &ParticipantId) -> Option<Arc<FakeTransport>> {
        self.transports_for(id).await.pop()
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        key: PeerKey,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let behavior = self.behavior.lock().await.clone();
        if behavior.fail_create {
            bail!("scripted transport creation failure");
        }
        let transport = Arc::new(FakeTransport::new(key, behavior, events));
        self.created.lock().await.push(Arc::clone(&transport));
        Ok(transport)
    }
}
