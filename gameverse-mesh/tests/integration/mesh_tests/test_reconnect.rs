use gameverse_core::{IceCandidate, ParticipantId, SignalMessage};
use gameverse_mesh::{MeshCommand, MeshEvent};

use crate::integration::{create_ready_mesh, full_media, ids, init_tracing};

#[tokio::test]
async fn test_reconnect_rebuilds_mesh_from_latest_roster() {
    init_tracing();

    let mut mesh = create_ready_mesh("a").await;
    mesh.coordinator
        .handle_command(MeshCommand::Roster(ids(&["a", "b", "c"])))
        .await;
    let before = mesh.factory.created_count().await;
    mesh.coordinator
        .on_candidate_received(ParticipantId::from("b"), IceCandidate::new("candidate:1"))
        .await;
    mesh.coordinator
        .on_candidate_received(ParticipantId::from("zz"), IceCandidate::new("candidate:2"))
        .await;

    mesh.coordinator.handle_command(MeshCommand::Reconnect).await;

    assert!(mesh.coordinator.peer_ids().is_empty());
    assert!(mesh.coordinator.local_media().is_none());
    assert_eq!(mesh.coordinator.buffered_candidates(&ParticipantId::from("b")), 0);
    assert_eq!(mesh.coordinator.buffered_candidates(&ParticipantId::from("zz")), 0);
    for id in ids(&["b", "c"]) {
        for transport in mesh.factory.transports_for(&id).await {
            assert_eq!(transport.close_count().await, 1);
        }
    }
    assert_eq!(mesh.signaling.count("join-room").await, 1);

    mesh.coordinator.on_media_ready(full_media().await).await;

    assert_eq!(mesh.coordinator.live_peers(), ids(&["b", "c"]));
    assert_eq!(mesh.factory.created_count().await, before + 2);
}

#[tokio::test]
async fn test_leave_closes_everything_and_notifies_relay() {
    init_tracing();

    let mut mesh = create_ready_mesh("a").await;
    mesh.coordinator
        .handle_command(MeshCommand::Joined {
            room_id: "lobby".into(),
        })
        .await;
    mesh.coordinator
        .handle_command(MeshCommand::Roster(ids(&["a", "b"])))
        .await;
    assert!(mesh.handle.status().joined);

    mesh.coordinator.leave().await;

    assert!(mesh.coordinator.peer_ids().is_empty());
    assert!(!mesh.handle.status().joined);
    let sent = mesh.signaling.sent().await;
    assert!(matches!(
        sent.last(),
        Some(SignalMessage::LeaveRoom { room_id }) if room_id.0 == "lobby"
    ));
    assert!(
        mesh.drain_events()
            .iter()
            .any(|e| matches!(e, MeshEvent::Left))
    );
}

#[tokio::test]
async fn test_join_lifecycle_messages() {
    init_tracing();

    let mut mesh = create_ready_mesh("a").await;
    mesh.coordinator.join().await;
    mesh.coordinator
        .handle_command(MeshCommand::Joined {
            room_id: "lobby".into(),
        })
        .await;
    mesh.coordinator
        .handle_command(MeshCommand::JoinFailed {
            reason: "room full".into(),
        })
        .await;

    let kinds: Vec<&'static str> = mesh
        .signaling
        .sent()
        .await
        .iter()
        .map(SignalMessage::kind)
        .collect();
    assert_eq!(kinds, vec!["join-room", "room-users"]);

    let events = mesh.drain_events();
    assert!(events.iter().any(|e| matches!(e, MeshEvent::Joined { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        MeshEvent::JoinFailed { reason } if reason == "room full"
    )));
}
