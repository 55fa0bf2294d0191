use std::sync::Arc;
use std::time::{Duration, Instant};

use gameverse_core::{EncodingParameters, ParticipantId, TrackKind};
use gameverse_mesh::transport::{LinkState, StatsSample};
use gameverse_mesh::{MeshEvent, PeerState};

use crate::integration::{TestMesh, create_ready_mesh, init_tracing};
use crate::utils::{FakeBehavior, FakeTransport, TransportCall};

/// Cumulative counters that lose `lost_per_step` of every 100 packets.
fn lossy_samples(steps: u64, lost_per_step: u64) -> Vec<StatsSample> {
    let start = Instant::now();
    (1..=steps)
        .map(|i| StatsSample {
            at: start + Duration::from_secs(5 * i),
            packets_lost: lost_per_step * i,
            packets_received: (100 - lost_per_step) * i,
            bytes_received: 100_000 * i,
        })
        .collect()
}

async fn connected_mesh() -> (TestMesh, ParticipantId, Arc<FakeTransport>) {
    let mut mesh = create_ready_mesh("a").await;
    let b = ParticipantId::from("b");
    mesh.coordinator.on_participant_joined(b.clone(), None).await;
    let transport = mesh.factory.latest_for(&b).await.expect("transport");
    mesh.coordinator
        .handle_transport_event(transport.state_event(LinkState::Connected))
        .await;
    (mesh, b, transport)
}

#[tokio::test]
async fn test_sustained_heavy_loss_never_upscales() {
    init_tracing();

    let (mut mesh, b, transport) = connected_mesh().await;
    for sample in lossy_samples(6, 15) {
        transport.push_stats(sample).await;
    }

    let mut previous = mesh
        .coordinator
        .peer(&b)
        .and_then(|p| p.video_encoding())
        .expect("default video encoding");
    assert_eq!(previous, EncodingParameters::VIDEO_DEFAULT);

    for _ in 0..6 {
        mesh.coordinator.check_quality().await;
        let current = mesh
            .coordinator
            .peer(&b)
            .and_then(|p| p.video_encoding())
            .expect("video encoding");
        assert!(current.scale_resolution_down_by >= previous.scale_resolution_down_by);
        assert!(current.max_bitrate_bps <= previous.max_bitrate_bps);
        previous = current;
    }

    assert_eq!(previous.scale_resolution_down_by, 2.0);
    assert_eq!(previous.max_bitrate_bps, 500_000);

    let changes = mesh
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, MeshEvent::EncodingChanged { .. }))
        .count();
    assert_eq!(changes, 1, "only the first pass changes anything");
}

#[tokio::test]
async fn test_moderate_loss_after_heavy_loss_keeps_tighter_limits() {
    init_tracing();

    let (mut mesh, b, transport) = connected_mesh().await;
    let start = Instant::now();
    let samples = [(0, 0, 0), (20, 80, 5), (27, 173, 10)];
    for (lost, received, secs) in samples {
        transport
            .push_stats(StatsSample {
                at: start + Duration::from_secs(secs),
                packets_lost: lost,
                packets_received: received,
                bytes_received: 0,
            })
            .await;
    }

    // First sample alone carries no traffic.
    mesh.coordinator.check_quality().await;
    // 20% loss in the window.
    mesh.coordinator.check_quality().await;
    // 7% loss in the window.
    mesh.coordinator.check_quality().await;

    let params = mesh
        .coordinator
        .peer(&b)
        .and_then(|p| p.video_encoding())
        .expect("video encoding");
    assert_eq!(params.scale_resolution_down_by, 2.0);
    assert_eq!(params.max_bitrate_bps, 500_000);
}

#[tokio::test]
async fn test_moderate_loss_from_defaults() {
    init_tracing();

    let (mut mesh, b, transport) = connected_mesh().await;
    for sample in lossy_samples(1, 7) {
        transport.push_stats(sample).await;
    }

    mesh.coordinator.check_quality().await;

    let params = mesh
        .coordinator
        .peer(&b)
        .and_then(|p| p.video_encoding())
        .expect("video encoding");
    assert_eq!(params.scale_resolution_down_by, 1.5);
    assert_eq!(params.max_bitrate_bps, 650_000);
    assert!(
        transport
            .calls()
            .await
            .contains(&TransportCall::SetEncoding(TrackKind::Video, params))
    );
}

#[tokio::test]
async fn test_low_loss_leaves_encoding_alone() {
    init_tracing();

    let (mut mesh, b, transport) = connected_mesh().await;
    for sample in lossy_samples(3, 2) {
        transport.push_stats(sample).await;
    }
    for _ in 0..3 {
        mesh.coordinator.check_quality().await;
    }

    assert_eq!(
        mesh.coordinator.peer(&b).and_then(|p| p.video_encoding()),
        Some(EncodingParameters::VIDEO_DEFAULT)
    );
    assert_eq!(
        mesh.coordinator.peer(&b).map(|p| p.stats_history().len()),
        Some(3)
    );
}

#[tokio::test]
async fn test_only_connected_peers_are_adjusted() {
    init_tracing();

    let mut mesh = create_ready_mesh("a").await;
    let b = ParticipantId::from("b");
    mesh.coordinator.on_participant_joined(b.clone(), None).await;
    let transport = mesh.factory.latest_for(&b).await.expect("transport");
    for sample in lossy_samples(2, 30) {
        transport.push_stats(sample).await;
    }

    mesh.coordinator.check_quality().await;
    mesh.coordinator.check_quality().await;

    assert_eq!(
        mesh.coordinator.peer(&b).and_then(|p| p.video_encoding()),
        Some(EncodingParameters::VIDEO_DEFAULT)
    );
}

#[tokio::test]
async fn test_encoding_failure_leaves_state_untouched() {
    init_tracing();

    let mut mesh = create_ready_mesh("a").await;
    mesh.factory
        .set_behavior(FakeBehavior {
            fail_encoding: true,
            ..FakeBehavior::default()
        })
        .await;
    let b = ParticipantId::from("b");
    mesh.coordinator.on_participant_joined(b.clone(), None).await;
    let transport = mesh.factory.latest_for(&b).await.expect("transport");
    mesh.coordinator
        .handle_transport_event(transport.state_event(LinkState::Connected))
        .await;
    for sample in lossy_samples(1, 30) {
        transport.push_stats(sample).await;
    }

    mesh.coordinator.check_quality().await;

    assert_eq!(
        mesh.coordinator.peer(&b).map(|p| p.state()),
        Some(PeerState::Connected)
    );
    assert!(
        mesh.drain_events()
            .iter()
            .all(|e| !matches!(e, MeshEvent::EncodingChanged { .. }))
    );
}
