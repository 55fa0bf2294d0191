use std::sync::Arc;
use tokio::sync::mpsc;

use gameverse_core::{ParticipantId, SessionDescription};
use gameverse_mesh::peer::{CandidateBuffer, NegotiationRole, PeerConnection, PeerContext};
use gameverse_mesh::transport::{LinkState, PeerKey};
use gameverse_mesh::{MeshConfig, MeshEvent, PeerState};

use crate::integration::{create_ready_mesh, full_media, init_tracing};
use crate::utils::{FakeBehavior, FakeTransportFactory, MockSignaling};

struct Fixture {
    ctx: PeerContext,
    signaling: MockSignaling,
    factory: Arc<FakeTransportFactory>,
    _transport_rx: mpsc::Receiver<gameverse_mesh::TransportEvent>,
}

fn fixture() -> Fixture {
    let (signaling, _signal_rx) = MockSignaling::new("a");
    let factory = FakeTransportFactory::new();
    let (transport_tx, transport_rx) = mpsc::channel(16);
    let ctx = PeerContext::new(
        &MeshConfig::default(),
        Arc::new(signaling.clone()),
        factory.clone(),
        transport_tx,
    );
    Fixture {
        ctx,
        signaling,
        factory,
        _transport_rx: transport_rx,
    }
}

fn key(id: &str) -> PeerKey {
    PeerKey {
        participant_id: ParticipantId::from(id),
        connection_id: 1,
    }
}

#[tokio::test]
async fn test_close_twice_equals_close_once() {
    init_tracing();

    let fx = fixture();
    let media = full_media().await.media;
    let mut peer = PeerConnection::initiate(key("b"), &fx.ctx, &media).await;
    assert_eq!(
        peer.state(),
        PeerState::Negotiating(NegotiationRole::Offering)
    );

    peer.close().await;
    let after_first = peer.state();
    peer.close().await;

    assert_eq!(after_first, PeerState::Closed);
    assert_eq!(peer.state(), PeerState::Closed);

    let transport = fx
        .factory
        .latest_for(&ParticipantId::from("b"))
        .await
        .expect("transport");
    assert_eq!(transport.close_count().await, 1);
}

#[tokio::test]
async fn test_initiate_attaches_tracks_with_default_encoding() {
    init_tracing();

    let fx = fixture();
    let media = full_media().await.media;
    let peer = PeerConnection::initiate(key("b"), &fx.ctx, &media).await;

    assert_eq!(peer.outbound_tracks().len(), 2);
    assert_eq!(
        peer.video_encoding(),
        Some(gameverse_core::EncodingParameters::VIDEO_DEFAULT)
    );
    assert!(peer.local_description().is_some());
    assert_eq!(fx.signaling.offers_to(&ParticipantId::from("b")).await.len(), 1);
}

#[tokio::test]
async fn test_offer_failure_marks_peer_failed() {
    init_tracing();

    let fx = fixture();
    fx.factory
        .set_behavior(FakeBehavior {
            fail_offer: true,
            ..FakeBehavior::default()
        })
        .await;
    let media = full_media().await.media;

    let peer = PeerConnection::initiate(key("b"), &fx.ctx, &media).await;

    assert_eq!(peer.state(), PeerState::Failed);
    assert!(fx.signaling.offers_to(&ParticipantId::from("b")).await.is_empty());
    let transport = fx
        .factory
        .latest_for(&ParticipantId::from("b"))
        .await
        .expect("transport");
    assert_eq!(transport.close_count().await, 1, "failed transport released");
}

#[tokio::test]
async fn test_transport_creation_failure_marks_peer_failed() {
    init_tracing();

    let fx = fixture();
    fx.factory
        .set_behavior(FakeBehavior {
            fail_create: true,
            ..FakeBehavior::default()
        })
        .await;
    let media = full_media().await.media;
    let mut buffer = CandidateBuffer::new();

    let peer = PeerConnection::accept_offer(
        key("b"),
        &fx.ctx,
        &media,
        SessionDescription::offer("offer-from-b"),
        &mut buffer,
    )
    .await;

    assert_eq!(peer.state(), PeerState::Failed);
    assert_eq!(fx.factory.created_count().await, 0);
}

#[tokio::test]
async fn test_answer_outside_offering_is_ignored() {
    init_tracing();

    let fx = fixture();
    let media = full_media().await.media;
    let mut buffer = CandidateBuffer::new();
    let mut peer = PeerConnection::accept_offer(
        key("b"),
        &fx.ctx,
        &media,
        SessionDescription::offer("offer-from-b"),
        &mut buffer,
    )
    .await;

    let applied = peer
        .accept_answer(SessionDescription::answer("stray"), &mut buffer)
        .await;

    assert!(!applied);
    assert_eq!(
        peer.state(),
        PeerState::Negotiating(NegotiationRole::Answering)
    );
}

#[tokio::test]
async fn test_connected_only_when_transport_reports_it() {
    init_tracing();

    let mut mesh = create_ready_mesh("a").await;
    let b = ParticipantId::from("b");

    mesh.coordinator.on_participant_joined(b.clone(), None).await;
    mesh.coordinator
        .on_answer_received(b.clone(), SessionDescription::answer("answer-from-b"))
        .await;
    assert_eq!(
        mesh.coordinator.peer(&b).map(|p| p.state()),
        Some(PeerState::Negotiating(NegotiationRole::Offering)),
        "an applied answer alone is not a connection"
    );

    let transport = mesh.factory.latest_for(&b).await.expect("transport");
    mesh.coordinator
        .handle_transport_event(transport.state_event(LinkState::Connected))
        .await;
    assert_eq!(
        mesh.coordinator.peer(&b).map(|p| p.state()),
        Some(PeerState::Connected)
    );

    mesh.coordinator
        .handle_transport_event(transport.state_event(LinkState::Disconnected))
        .await;
    assert_eq!(
        mesh.coordinator.peer(&b).map(|p| p.state()),
        Some(PeerState::Degraded)
    );

    mesh.coordinator
        .handle_transport_event(transport.state_event(LinkState::Failed))
        .await;
    assert_eq!(
        mesh.coordinator.peer(&b).map(|p| p.state()),
        Some(PeerState::Failed)
    );

    let states: Vec<PeerState> = mesh
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            MeshEvent::PeerStateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            PeerState::Negotiating(NegotiationRole::Offering),
            PeerState::Connected,
            PeerState::Degraded,
            PeerState::Failed,
        ]
    );
}

#[tokio::test]
async fn test_events_from_replaced_connection_are_dropped() {
    init_tracing();

    let mut mesh = create_ready_mesh("a").await;
    let b = ParticipantId::from("b");

    mesh.coordinator.on_participant_joined(b.clone(), None).await;
    let old = mesh.factory.latest_for(&b).await.expect("transport");

    mesh.coordinator
        .on_offer_received(b.clone(), SessionDescription::offer("offer-from-b"))
        .await;
    mesh.coordinator
        .handle_transport_event(old.state_event(LinkState::Failed))
        .await;

    assert_eq!(
        mesh.coordinator.peer(&b).map(|p| p.state()),
        Some(PeerState::Negotiating(NegotiationRole::Answering))
    );
}
