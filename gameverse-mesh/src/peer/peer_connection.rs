use crate::media::{LocalMedia, LocalTrack};
use crate::peer::{CandidateBuffer, NegotiationRole, PeerContext, PeerState, StatsHistory};
use crate::transport::{LinkState, PeerKey, PeerTransport, RemoteTrack, StatsSample};
use anyhow::{Context, Result};
use gameverse_core::{
    EncodingParameters, IceCandidate, ParticipantId, SessionDescription, TrackKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Connection to one remote participant.
///
/// Both negotiation roles use the same steps: build the transport, attach
/// the shared local tracks, exchange descriptions. Errors never escape a
/// step; they move the connection to [`PeerState::Failed`] and the mesh
/// replaces it on the next reconcile.
pub struct PeerConnection {
    key: PeerKey,
    state: PeerState,
    transport: Option<Arc<dyn PeerTransport>>,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    outbound: Vec<LocalTrack>,
    inbound: Vec<RemoteTrack>,
    stats: StatsHistory,
    video_encoding: Option<EncodingParameters>,
    negotiation_started: Option<Instant>,
}

impl PeerConnection {
    fn new(key: PeerKey, ctx: &PeerContext) -> Self {
        Self {
            key,
            state: PeerState::Idle,
            transport: None,
            local_description: None,
            remote_description: None,
            outbound: Vec::new(),
            inbound: Vec::new(),
            stats: StatsHistory::new(ctx.stats_history_len()),
            video_encoding: None,
            negotiation_started: None,
        }
    }

    fn begin(&mut self, role: NegotiationRole) {
        self.state = PeerState::Negotiating(role);
        self.negotiation_started = Some(Instant::now());
    }

    /// Starts an outbound negotiation and sends the offer.
    pub async fn initiate(key: PeerKey, ctx: &PeerContext, media: &LocalMedia) -> Self {
        let mut peer = Self::new(key, ctx);
        peer.begin(NegotiationRole::Offering);
        info!("Initiating connection to {}", peer.participant_id());

        if let Err(e) = peer.send_offer(ctx, media).await {
            error!("Offer to {} failed: {:?}", peer.participant_id(), e);
            peer.fail().await;
        }
        peer
    }

    /// Answers `offer`. Candidates buffered for the caller are applied right
    /// after the remote description is set.
    pub async fn accept_offer(
        key: PeerKey,
        ctx: &PeerContext,
        media: &LocalMedia,
        offer: SessionDescription,
        buffer: &mut CandidateBuffer,
    ) -> Self {
        let mut peer = Self::new(key, ctx);
        peer.begin(NegotiationRole::Answering);
        info!("Accepting offer from {}", peer.participant_id());

        if let Err(e) = peer.send_answer(ctx, media, offer, buffer).await {
            error!("Answer to {} failed: {:?}", peer.participant_id(), e);
            peer.fail().await;
        }
        peer
    }

    async fn send_offer(&mut self, ctx: &PeerContext, media: &LocalMedia) -> Result<()> {
        let transport = self.open_transport(ctx, media).await?;

        let offer = transport
            .create_offer()
            .await
            .context("Failed to create offer")?;
        transport
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local offer")?;
        self.local_description = Some(offer.clone());

        ctx.send_offer(self.participant_id(), offer).await;
        debug!("Offer sent to {}", self.participant_id());
        Ok(())
    }

    async fn send_answer(
        &mut self,
        ctx: &PeerContext,
        media: &LocalMedia,
        offer: SessionDescription,
        buffer: &mut CandidateBuffer,
    ) -> Result<()> {
        let transport = self.open_transport(ctx, media).await?;

        transport
            .set_remote_description(offer.clone())
            .await
            .context("Failed to set remote offer")?;
        self.remote_description = Some(offer);
        buffer.drain(self.participant_id(), transport.as_ref()).await;

        let answer = transport
            .create_answer()
            .await
            .context("Failed to create answer")?;
        transport
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local answer")?;
        self.local_description = Some(answer.clone());

        ctx.send_answer(self.participant_id(), answer).await;
        debug!("Answer sent to {}", self.participant_id());
        Ok(())
    }

    async fn open_transport(
        &mut self,
        ctx: &PeerContext,
        media: &LocalMedia,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = ctx
            .factory()
            .create(self.key.clone(), ctx.transport_tx())
            .await
            .context("Failed to create transport")?;
        self.transport = Some(Arc::clone(&transport));

        for track in media.tracks() {
            transport.add_track(track).await?;
            self.outbound.push(track.clone());

            let params = ctx.default_encoding(track.kind);
            match transport.set_encoding(track.kind, params).await {
                Ok(()) if track.kind == TrackKind::Video => self.video_encoding = Some(params),
                Ok(()) => {}
                Err(e) => warn!(
                    "Default {:?} encoding for {} not applied: {:?}",
                    track.kind,
                    self.participant_id(),
                    e
                ),
            }
        }
        Ok(transport)
    }

    /// Completes an outbound negotiation. Only valid while offering; anything
    /// else is logged and ignored. Returns whether the answer was applied.
    pub async fn accept_answer(
        &mut self,
        answer: SessionDescription,
        buffer: &mut CandidateBuffer,
    ) -> bool {
        if self.state != PeerState::Negotiating(NegotiationRole::Offering) {
            warn!(
                "Ignoring answer from {} in state {:?}",
                self.participant_id(),
                self.state
            );
            return false;
        }
        let Some(transport) = self.transport.clone() else {
            return false;
        };

        if let Err(e) = transport.set_remote_description(answer.clone()).await {
            error!("Failed to apply answer from {}: {:?}", self.participant_id(), e);
            self.fail().await;
            return false;
        }
        self.remote_description = Some(answer);
        buffer.drain(self.participant_id(), transport.as_ref()).await;
        debug!("Answer from {} applied", self.participant_id());
        true
    }

    /// Applies a remote candidate, or buffers it while no remote description
    /// exists yet.
    pub async fn add_candidate(&self, candidate: IceCandidate, buffer: &mut CandidateBuffer) {
        let transport = match (&self.transport, &self.remote_description) {
            (Some(transport), Some(_)) if !self.state.is_terminal() => transport,
            _ => {
                buffer.push(self.participant_id(), candidate);
                return;
            }
        };

        if let Err(e) = transport.add_ice_candidate(candidate).await {
            warn!(
                "Failed to add ICE candidate for {}: {:?}",
                self.participant_id(),
                e
            );
        }
    }

    /// Releases the transport. Safe to call repeatedly and mid-negotiation.
    pub async fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("Error closing connection to {}: {:?}", self.participant_id(), e);
            }
            info!("Connection to {} closed", self.participant_id());
        }
        self.inbound.clear();
        self.state = PeerState::Closed;
    }

    async fn fail(&mut self) {
        if let Some(transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.state = PeerState::Failed;
    }

    /// Returns the new state when the report changed it.
    pub async fn on_link_state(&mut self, link: LinkState) -> Option<PeerState> {
        let next = self.state.on_link(link);
        if next == self.state {
            return None;
        }
        info!(
            "Peer {} {:?} -> {:?}",
            self.participant_id(),
            self.state,
            next
        );
        if next == PeerState::Failed {
            self.fail().await;
        } else {
            self.state = next;
        }
        Some(next)
    }

    /// Records an inbound track. Returns `false` for a duplicate.
    pub fn track_received(&mut self, track: RemoteTrack) -> bool {
        if self.inbound.iter().any(|t| t.track_id == track.track_id) {
            return false;
        }
        self.inbound.push(track);
        true
    }

    /// Reads one stats sample into the history.
    pub async fn sample_stats(&mut self) -> Option<StatsSample> {
        let transport = self.transport.as_ref()?;
        match transport.stats().await {
            Ok(Some(sample)) => {
                self.stats.push(sample);
                Some(sample)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Stats unavailable for {}: {:?}", self.participant_id(), e);
                None
            }
        }
    }

    /// Applies new outbound video limits. Failure is logged and leaves the
    /// connection state untouched.
    pub async fn apply_video_encoding(&mut self, params: EncodingParameters) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };
        if !self.outbound.iter().any(|t| t.kind == TrackKind::Video) {
            return false;
        }
        match transport.set_encoding(TrackKind::Video, params).await {
            Ok(()) => {
                self.video_encoding = Some(params);
                true
            }
            Err(e) => {
                warn!(
                    "Failed to adjust video encoding for {}: {:?}",
                    self.participant_id(),
                    e
                );
                false
            }
        }
    }

    /// Time spent negotiating so far; `None` once the connection left the
    /// negotiating state.
    pub fn negotiating_for(&self) -> Option<Duration> {
        match self.state {
            PeerState::Negotiating(_) => self.negotiation_started.map(|t| t.elapsed()),
            _ => None,
        }
    }

    /// Still negotiating after `timeout`: the offer or answer was most
    /// likely lost in signaling.
    pub fn is_stalled(&self, timeout: Duration) -> bool {
        self.negotiating_for().is_some_and(|elapsed| elapsed >= timeout)
    }

    pub fn key(&self) -> &PeerKey {
        &self.key
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.key.participant_id
    }

    pub fn connection_id(&self) -> u64 {
        self.key.connection_id
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    pub fn outbound_tracks(&self) -> &[LocalTrack] {
        &self.outbound
    }

    pub fn inbound_tracks(&self) -> &[RemoteTrack] {
        &self.inbound
    }

    pub fn stats_history(&self) -> &StatsHistory {
        &self.stats
    }

    /// `None` when no video track is being sent.
    pub fn video_encoding(&self) -> Option<EncodingParameters> {
        self.video_encoding
    }
}
