use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use gameverse_core::ParticipantId;
use gameverse_mesh::config::IntervalConfig;
use gameverse_mesh::{
    MESH_COMMAND_CAPACITY, MeshConfig, MeshCoordinator, MeshHandle, PeerState, SampleTrackCapture,
    WebRtcTransportFactory, WsSignaling,
};

use crate::integration::init_tracing;
use crate::utils::start_test_relay;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Host candidates only; nothing leaves the machine.
fn local_config() -> MeshConfig {
    MeshConfig {
        ice_servers: vec![],
        intervals: IntervalConfig {
            reconcile_ms: 500,
            health_ms: 1_000,
            quality_ms: 1_000,
            ..IntervalConfig::default()
        },
        ..MeshConfig::default()
    }
}

async fn spawn_mesh(url: &str, id: &str) -> anyhow::Result<(MeshHandle, JoinHandle<()>)> {
    let config = local_config();
    let (command_tx, command_rx) = mpsc::channel(MESH_COMMAND_CAPACITY);
    let signaling = WsSignaling::connect(url, ParticipantId::from(id), &command_tx).await?;
    let factory = WebRtcTransportFactory::new(&config)?;
    let capture = SampleTrackCapture::new(id, config.preferred_video_codec);

    let (coordinator, handle) = MeshCoordinator::new(
        config,
        "lobby".into(),
        Arc::new(signaling),
        Arc::new(factory),
        Arc::new(capture),
        command_tx,
        command_rx,
    );
    let task = tokio::spawn(coordinator.with_display_name(id).run());
    Ok((handle, task))
}

async fn wait_connected(handle: &MeshHandle, remote: &str) {
    let remote = ParticipantId::from(remote);
    let mut status = handle.status_updates();
    timeout(
        CONNECT_TIMEOUT,
        status.wait_for(|s| s.peers.get(&remote) == Some(&PeerState::Connected)),
    )
    .await
    .expect("timed out waiting for peer connection")
    .expect("status channel closed");
}

#[tokio::test]
async fn test_two_participants_connect_over_loopback() -> anyhow::Result<()> {
    init_tracing();

    let url = start_test_relay().await?;
    let (alice, alice_task) = spawn_mesh(&url, "alice").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (bob, bob_task) = spawn_mesh(&url, "bob").await?;

    wait_connected(&alice, "bob").await;
    wait_connected(&bob, "alice").await;

    let status = alice.status();
    assert!(status.joined);
    assert!(!status.connectivity_degraded);
    assert_eq!(status.connected_peers(), 1);

    alice.leave().await?;
    bob.leave().await?;
    timeout(Duration::from_secs(10), alice_task).await??;
    timeout(Duration::from_secs(10), bob_task).await??;
    Ok(())
}
