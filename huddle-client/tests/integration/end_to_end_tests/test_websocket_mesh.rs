use anyhow::Result;
use huddle_client::{ClientConfig, LinkState, MeshCoordinator, MeshEvent, SignalingClient};
use huddle_core::{Envelope, EnvelopeKind, JoinRequest, Role};
use huddle_server::{AppState, router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::integration::init_tracing;
use crate::utils::{FakeTransport, MESH_TIMEOUT_MS, wait_for_event, wait_for_link_state};

async fn spawn_relay() -> Result<SocketAddr> {
    let state = Arc::new(AppState::new());
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            tracing::error!("[TestRelay] serve failed: {}", e);
        }
    });
    Ok(addr)
}

#[tokio::test]
async fn test_signaling_client_speaks_envelopes() {
    init_tracing();

    let addr = spawn_relay().await.expect("relay failed to start");
    let mut client = SignalingClient::connect(&format!("ws://{}/ws", addr))
        .await
        .expect("connect failed");

    client
        .sender()
        .send(Envelope::join("ab12", &JoinRequest::default()))
        .unwrap();
    let ack = tokio::time::timeout(
        std::time::Duration::from_millis(MESH_TIMEOUT_MS),
        client.recv(),
    )
    .await
    .expect("no ack")
    .expect("relay closed");
    assert_eq!(ack.kind, EnvelopeKind::Join);
    assert_eq!(ack.room_id.as_deref(), Some("AB12"));

    client.abort();
}

#[tokio::test]
async fn test_mesh_over_websocket_relay() {
    init_tracing();

    let addr = spawn_relay().await.expect("relay failed to start");
    let url = format!("ws://{}/ws", addr);

    let host_transport = FakeTransport::auto_connecting();
    let (host, mut host_events) = MeshCoordinator::connect(
        &ClientConfig::new(url.clone())
            .with_display_name("Host")
            .with_role(Role::Host),
        Arc::new(host_transport.clone()),
    )
    .await
    .expect("host connect failed");

    let guest_transport = FakeTransport::auto_connecting();
    let (guest, mut guest_events) = MeshCoordinator::connect(
        &ClientConfig::new(url).with_display_name("Guest"),
        Arc::new(guest_transport.clone()),
    )
    .await
    .expect("guest connect failed");

    let host_room = host.join("AB12").await.expect("host join failed");
    let guest_room = guest.join("ab12").await.expect("guest join failed");
    assert_eq!(guest_room.room_id, host_room.room_id);

    wait_for_link_state(
        &mut host_events,
        guest_room.session_id,
        LinkState::Connected,
        MESH_TIMEOUT_MS,
    )
    .await
    .expect("host link");
    wait_for_link_state(
        &mut guest_events,
        host_room.session_id,
        LinkState::Connected,
        MESH_TIMEOUT_MS,
    )
    .await
    .expect("guest link");

    host.send_chat("welcome").await.unwrap();
    let chat = wait_for_event(&mut guest_events, MESH_TIMEOUT_MS, |e| {
        matches!(e, MeshEvent::Chat { .. })
    })
    .await
    .expect("guest never got chat");
    assert!(matches!(chat, MeshEvent::Chat { text, .. } if text == "welcome"));

    // Dropping the host's socket reads as a leave on the guest side.
    host.shutdown();
    wait_for_link_state(
        &mut guest_events,
        host_room.session_id,
        LinkState::Closed,
        MESH_TIMEOUT_MS,
    )
    .await
    .expect("guest link to host must close");

    guest.leave().await.unwrap();
    guest.shutdown();
}
