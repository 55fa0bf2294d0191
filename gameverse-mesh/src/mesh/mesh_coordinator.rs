use crate::MeshConfig;
use crate::media::{LocalMedia, MediaAcquisition, MediaCapture, acquire_with_fallback};
use crate::mesh::{MeshCommand, MeshEvent, MeshHandle, MeshStatus, Roster};
use crate::monitor::{HealthMonitor, QualityMonitor};
use crate::peer::{CandidateBuffer, NegotiationRole, PeerConnection, PeerContext, PeerState};
use crate::signaling::SignalingOutput;
use crate::transport::{PeerKey, TransportEvent, TransportFactory};
use gameverse_core::{
    IceCandidate, MediaConstraints, ParticipantId, RoomId, SessionDescription, SignalMessage,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Owns every peer connection of one room session.
///
/// All mesh state lives in this struct and is only touched from [`run`],
/// which multiplexes relay commands, transport events and the reconcile,
/// health and quality ticks. Transport callbacks never touch it directly.
///
/// [`run`]: MeshCoordinator::run
pub struct MeshCoordinator {
    config: MeshConfig,
    room_id: RoomId,
    display_name: Option<String>,
    ctx: PeerContext,
    capture: Arc<dyn MediaCapture>,

    peers: HashMap<ParticipantId, PeerConnection>,
    roster: Roster,
    buffer: CandidateBuffer,
    next_connection_id: u64,

    media: Option<LocalMedia>,
    media_epoch: u64,
    /// Participants to initiate with once media is ready.
    pending_joins: Vec<ParticipantId>,
    /// Latest offer per participant received before media was ready.
    pending_offers: BTreeMap<ParticipantId, SessionDescription>,

    joined: bool,
    health: HealthMonitor,
    quality: QualityMonitor,

    command_tx: mpsc::WeakSender<MeshCommand>,
    command_rx: mpsc::Receiver<MeshCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    events: mpsc::Sender<MeshEvent>,
    status_tx: watch::Sender<MeshStatus>,
}

impl MeshCoordinator {
    /// `command_tx`/`command_rx` are created by the caller so the signaling
    /// client can be given a sender before the coordinator exists.
    pub fn new(
        config: MeshConfig,
        room_id: RoomId,
        signaling: Arc<dyn SignalingOutput>,
        factory: Arc<dyn TransportFactory>,
        capture: Arc<dyn MediaCapture>,
        command_tx: mpsc::Sender<MeshCommand>,
        command_rx: mpsc::Receiver<MeshCommand>,
    ) -> (Self, MeshHandle) {
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_len.max(1));
        let (status_tx, status_rx) = watch::channel(MeshStatus::default());

        let ctx = PeerContext::new(&config, signaling, factory, transport_tx);
        let health = HealthMonitor::new(config.health.auto_reconnect_after);

        let coordinator = Self {
            config,
            room_id,
            display_name: None,
            ctx,
            capture,
            peers: HashMap::new(),
            roster: Roster::new(),
            buffer: CandidateBuffer::new(),
            next_connection_id: 0,
            media: None,
            media_epoch: 0,
            pending_joins: Vec::new(),
            pending_offers: BTreeMap::new(),
            joined: false,
            health,
            quality: QualityMonitor::new(),
            command_tx: command_tx.downgrade(),
            command_rx,
            transport_rx,
            events: events_tx,
            status_tx,
        };
        let handle = MeshHandle::new(command_tx, status_rx, events_rx);

        (coordinator, handle)
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub async fn run(mut self) {
        info!("Mesh for room {} started as {}", self.room_id, self.local_id());
        self.join().await;

        let intervals = self.config.intervals.clone();
        let start = Instant::now();
        let mut reconcile = interval_at(start + intervals.reconcile(), intervals.reconcile());
        let mut health = interval_at(start + intervals.health(), intervals.health());
        let mut quality = interval_at(start + intervals.quality(), intervals.quality());
        for timer in [&mut reconcile, &mut health, &mut quality] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MeshCommand::Leave) => {
                            self.leave().await;
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down mesh.");
                            self.leave().await;
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_transport_event(e).await,
                        None => {
                            warn!("Transport channel closed unexpectedly");
                            break;
                        }
                    }
                }

                _ = reconcile.tick() => self.on_reconcile_tick().await,
                _ = health.tick() => self.check_health().await,
                _ = quality.tick() => self.check_quality().await,
            }
        }

        info!("Mesh for room {} finished", self.room_id);
    }

    /// Announces ourselves to the relay and starts acquiring local media.
    pub async fn join(&mut self) {
        info!("Joining room {}", self.room_id);
        self.ctx
            .send(SignalMessage::JoinRoom {
                room_id: self.room_id.clone(),
                display_name: self.display_name.clone(),
            })
            .await;
        let ladder = self.config.media_tiers.clone();
        self.acquire_media(ladder);
    }

    fn acquire_media(&mut self, ladder: Vec<MediaConstraints>) {
        self.media_epoch += 1;
        let epoch = self.media_epoch;
        let Some(command_tx) = self.command_tx.upgrade() else {
            return;
        };
        let capture = Arc::clone(&self.capture);

        tokio::spawn(async move {
            let acquisition = acquire_with_fallback(capture.as_ref(), &ladder).await;
            let _ = command_tx
                .send(MeshCommand::MediaReady { epoch, acquisition })
                .await;
        });
    }

    pub async fn handle_command(&mut self, cmd: MeshCommand) {
        match cmd {
            MeshCommand::Joined { room_id } => {
                info!("Joined room {}", room_id);
                self.joined = true;
                self.ctx
                    .send(SignalMessage::RoomUsers {
                        room_id: room_id.clone(),
                    })
                    .await;
                self.emit(MeshEvent::Joined { room_id });
                self.publish_status();
            }

            MeshCommand::JoinFailed { reason } => {
                warn!("Join to room {} rejected: {}", self.room_id, reason);
                self.joined = false;
                self.emit(MeshEvent::JoinFailed { reason });
                self.publish_status();
            }

            MeshCommand::Roster(ids) => {
                let local_id = self.local_id().clone();
                self.roster.replace(ids, &local_id);
                debug!("Roster now has {} remote participants", self.roster.len());
                self.reconcile_roster().await;
            }

            MeshCommand::ParticipantJoined {
                participant_id,
                display_name,
            } => {
                self.on_participant_joined(participant_id, display_name)
                    .await
            }

            MeshCommand::ParticipantLeft { participant_id } => {
                self.on_participant_left(&participant_id).await
            }

            MeshCommand::Offer { from, description } => {
                self.on_offer_received(from, description).await
            }

            MeshCommand::Answer { from, description } => {
                self.on_answer_received(from, description).await
            }

            MeshCommand::IceCandidate { from, candidate } => {
                self.on_candidate_received(from, candidate).await
            }

            MeshCommand::MediaReady { epoch, acquisition } => {
                if epoch != self.media_epoch {
                    debug!("Discarding media from superseded acquisition {}", epoch);
                    return;
                }
                self.on_media_ready(acquisition).await;
            }

            MeshCommand::Reconnect => self.reconnect().await,

            MeshCommand::Leave => self.leave().await,
        }
    }

    /// Converges the peer map on `roster`: connects to every listed
    /// participant without a live connection and retires connections to
    /// anyone not listed. A negotiation that outlived the configured timeout
    /// is not live; its offer or answer was lost and it is started over.
    pub async fn reconcile(&mut self, roster: &[ParticipantId]) {
        let local_id = self.local_id().clone();
        let timeout = self.config.intervals.negotiation_timeout();

        let stale: Vec<ParticipantId> = self
            .peers
            .keys()
            .filter(|id| !roster.contains(id))
            .cloned()
            .collect();
        for id in stale {
            info!("Retiring {}: no longer in room", id);
            self.retire(&id).await;
        }

        for id in roster {
            if *id == local_id {
                continue;
            }
            match self.peers.get(id) {
                Some(peer) if timeout.is_some_and(|t| peer.is_stalled(t)) => {
                    info!("Negotiation with {} stalled, starting over", id);
                }
                Some(peer) if peer.state().is_live() => continue,
                _ => {}
            }
            self.initiate(id).await;
        }
    }

    /// Reconciles against the latest full roster. A no-op until one arrived.
    pub async fn reconcile_roster(&mut self) {
        if !self.roster.is_synced() {
            return;
        }
        let ids = self.roster.ids();
        self.reconcile(&ids).await;
    }

    async fn on_reconcile_tick(&mut self) {
        if self.joined {
            self.ctx
                .send(SignalMessage::RoomUsers {
                    room_id: self.room_id.clone(),
                })
                .await;
        }
        self.reconcile_roster().await;
    }

    pub async fn on_participant_joined(
        &mut self,
        participant_id: ParticipantId,
        display_name: Option<String>,
    ) {
        if &participant_id == self.local_id() {
            return;
        }
        info!("Participant {} joined", participant_id);
        self.roster.insert(participant_id.clone(), display_name);

        if !self.has_live_peer(&participant_id) {
            self.initiate(&participant_id).await;
        }
    }

    pub async fn on_participant_left(&mut self, participant_id: &ParticipantId) {
        info!("Participant {} left", participant_id);
        self.roster.remove(participant_id);
        self.pending_joins.retain(|id| id != participant_id);
        self.pending_offers.remove(participant_id);
        self.retire(participant_id).await;
    }

    /// The most recent offer always wins: any existing connection to the
    /// caller, including our own outbound negotiation, is abandoned.
    pub async fn on_offer_received(&mut self, from: ParticipantId, offer: SessionDescription) {
        if &from == self.local_id() {
            return;
        }
        self.roster.insert(from.clone(), None);

        let Some(media) = self.media.clone() else {
            debug!("Holding offer from {} until local media is ready", from);
            self.pending_offers.insert(from, offer);
            return;
        };

        if let Some(existing) = self.peers.get(&from) {
            if existing.state() == PeerState::Negotiating(NegotiationRole::Offering) {
                info!("Glare with {}: abandoning our offer", from);
            }
        }
        self.close_peer(&from).await;

        let key = self.next_key(&from);
        let peer =
            PeerConnection::accept_offer(key, &self.ctx, &media, offer, &mut self.buffer).await;
        self.insert_peer(peer);
    }

    pub async fn on_answer_received(&mut self, from: ParticipantId, answer: SessionDescription) {
        let Some(peer) = self.peers.get_mut(&from) else {
            warn!("Answer from {} without a connection, ignoring", from);
            return;
        };

        match peer.state() {
            PeerState::Negotiating(NegotiationRole::Offering) => {
                if !peer.accept_answer(answer, &mut self.buffer).await {
                    let state = peer.state();
                    self.emit(MeshEvent::PeerStateChanged {
                        participant_id: from,
                        state,
                    });
                    self.publish_status();
                }
            }
            // Both sides dropped their offers for each other's; the answer
            // belongs to a connection that no longer exists.
            PeerState::Negotiating(NegotiationRole::Answering) => {
                if self.local_id() < &from {
                    info!("Both sides answering with {}, offering again", from);
                    self.initiate(&from).await;
                } else {
                    debug!("Stale answer from {}, waiting for its new offer", from);
                }
            }
            state => warn!("Answer from {} in state {:?}, ignoring", from, state),
        }
    }

    /// Routes a remote candidate to its connection, or buffers it while no
    /// usable connection exists.
    pub async fn on_candidate_received(&mut self, from: ParticipantId, candidate: IceCandidate) {
        match self.peers.get(&from) {
            Some(peer) if !peer.state().is_terminal() => {
                peer.add_candidate(candidate, &mut self.buffer).await
            }
            _ => {
                debug!("Buffering candidate from {}", from);
                self.buffer.push(&from, candidate);
            }
        }
    }

    pub async fn on_media_ready(&mut self, acquisition: MediaAcquisition) {
        let MediaAcquisition { media, failures } = acquisition;
        if !failures.is_empty() {
            self.emit(MeshEvent::MediaFallback {
                tier: media.tier(),
                failures: failures.iter().map(ToString::to_string).collect(),
            });
        }
        info!("Local media ready at tier {:?}", media.tier());
        self.media = Some(media);
        self.publish_status();

        let offers = std::mem::take(&mut self.pending_offers);
        for (from, offer) in offers {
            self.on_offer_received(from, offer).await;
        }

        let joins = std::mem::take(&mut self.pending_joins);
        for id in joins {
            if self.roster.contains(&id) && !self.has_live_peer(&id) {
                self.initiate(&id).await;
            }
        }

        self.reconcile_roster().await;
    }

    /// Rebuilds the mesh from scratch with the reconnect media ladder.
    pub async fn reconnect(&mut self) {
        info!("Reconnecting mesh in room {}", self.room_id);

        self.close_all().await;
        self.buffer.clear();
        self.pending_joins.clear();
        self.pending_offers.clear();
        self.media = None;
        self.health.reset();
        self.publish_status();

        self.ctx
            .send(SignalMessage::JoinRoom {
                room_id: self.room_id.clone(),
                display_name: self.display_name.clone(),
            })
            .await;
        let ladder = self.config.reconnect_media_tiers.clone();
        self.acquire_media(ladder);
    }

    pub async fn leave(&mut self) {
        info!("Leaving room {}", self.room_id);
        self.ctx
            .send(SignalMessage::LeaveRoom {
                room_id: self.room_id.clone(),
            })
            .await;

        self.close_all().await;
        self.buffer.clear();
        self.pending_joins.clear();
        self.pending_offers.clear();
        self.media = None;
        // Late acquisitions must not revive the session.
        self.media_epoch += 1;
        self.joined = false;
        self.emit(MeshEvent::Left);
        self.publish_status();
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let key = event.peer().clone();
        let Some(peer) = self
            .peers
            .get_mut(&key.participant_id)
            .filter(|p| p.connection_id() == key.connection_id)
        else {
            debug!(
                "Dropping event for replaced connection {} #{}",
                key.participant_id, key.connection_id
            );
            return;
        };

        match event {
            TransportEvent::StateChanged { state, .. } => {
                let Some(next) = peer.on_link_state(state).await else {
                    return;
                };
                self.emit(MeshEvent::PeerStateChanged {
                    participant_id: key.participant_id,
                    state: next,
                });
                self.publish_status();
            }

            TransportEvent::CandidateGenerated { candidate, .. } => {
                self.ctx
                    .send_candidate(&key.participant_id, candidate)
                    .await;
            }

            TransportEvent::TrackReceived { track, .. } => {
                if !peer.track_received(track.clone()) {
                    return;
                }
                self.emit(MeshEvent::RemoteTrackAdded {
                    participant_id: key.participant_id,
                    track,
                });
            }
        }
    }

    pub async fn check_health(&mut self) {
        let check = self.health.check(self.peers.values().map(PeerConnection::state));
        if check.changed {
            self.emit(MeshEvent::ConnectivityChanged {
                degraded: check.degraded,
            });
            self.publish_status();
        }
        if check.reconnect_due {
            info!("Connectivity degraded for too long, reconnecting");
            self.reconnect().await;
        }
    }

    pub async fn check_quality(&mut self) {
        let changed = self.quality.run(&mut self.peers).await;
        for (participant_id, params) in changed {
            self.emit(MeshEvent::EncodingChanged {
                participant_id,
                params,
            });
        }
    }

    async fn initiate(&mut self, id: &ParticipantId) {
        let Some(media) = self.media.clone() else {
            if !self.pending_joins.contains(id) {
                debug!("Local media not ready, queueing {}", id);
                self.pending_joins.push(id.clone());
            }
            return;
        };

        self.close_peer(id).await;
        let key = self.next_key(id);
        let peer = PeerConnection::initiate(key, &self.ctx, &media).await;
        self.insert_peer(peer);
    }

    /// Closes the participant's connection and forgets everything buffered
    /// for it.
    async fn retire(&mut self, id: &ParticipantId) {
        self.close_peer(id).await;
        self.buffer.discard(id);
    }

    async fn close_peer(&mut self, id: &ParticipantId) {
        let Some(mut peer) = self.peers.remove(id) else {
            return;
        };
        let had_inbound = !peer.inbound_tracks().is_empty();
        peer.close().await;

        if had_inbound {
            self.emit(MeshEvent::RemoteStreamRemoved {
                participant_id: id.clone(),
            });
        }
        self.emit(MeshEvent::PeerStateChanged {
            participant_id: id.clone(),
            state: PeerState::Closed,
        });
        self.publish_status();
    }

    async fn close_all(&mut self) {
        let ids: Vec<ParticipantId> = self.peers.keys().cloned().collect();
        for id in ids {
            self.close_peer(&id).await;
        }
    }

    fn insert_peer(&mut self, peer: PeerConnection) {
        let participant_id = peer.participant_id().clone();
        self.emit(MeshEvent::PeerStateChanged {
            participant_id: participant_id.clone(),
            state: peer.state(),
        });
        self.peers.insert(participant_id, peer);
        self.publish_status();
    }

    fn next_key(&mut self, id: &ParticipantId) -> PeerKey {
        self.next_connection_id += 1;
        PeerKey {
            participant_id: id.clone(),
            connection_id: self.next_connection_id,
        }
    }

    fn has_live_peer(&self, id: &ParticipantId) -> bool {
        self.peers.get(id).is_some_and(|p| p.state().is_live())
    }

    /// Never blocks the loop: when the UI falls behind, new events are
    /// dropped. `MeshStatus` still carries the latest state.
    fn emit(&self, event: MeshEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Mesh event queue full, dropping {:?}", event);
            }
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }

    pub fn status(&self) -> MeshStatus {
        MeshStatus {
            joined: self.joined,
            connectivity_degraded: self.health.is_degraded(),
            media_tier: self.media.as_ref().map(LocalMedia::tier),
            peers: self
                .peers
                .iter()
                .map(|(id, peer)| (id.clone(), peer.state()))
                .collect(),
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        self.ctx.local_id()
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn peer(&self, id: &ParticipantId) -> Option<&PeerConnection> {
        self.peers.get(id)
    }

    pub fn peer_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn live_peers(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self
            .peers
            .iter()
            .filter(|(_, p)| p.state().is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn buffered_candidates(&self, id: &ParticipantId) -> usize {
        self.buffer.len(id)
    }

    pub fn local_media(&self) -> Option<&LocalMedia> {
        self.media.as_ref()
    }

    pub fn media_epoch(&self) -> u64 {
        self.media_epoch
    }

    pub fn pending_joins(&self) -> &[ParticipantId] {
        &self.pending_joins
    }
}
