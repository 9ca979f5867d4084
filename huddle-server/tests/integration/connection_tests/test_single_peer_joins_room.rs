use huddle_core::{EnvelopeKind, JoinRequest, Presence, Role, RoomCode, RoomMembership};

use crate::integration::{create_test_registry, init_tracing};
use crate::utils::connect_and_join;

#[tokio::test]
async fn test_single_peer_joins_room() {
    init_tracing();

    let (registry, signaling, _rx) = create_test_registry();

    let (host, membership) = connect_and_join(&registry, "ab12", "Host", Role::Host)
        .await
        .expect("Join failed");

    assert_eq!(membership.room_id.as_str(), "AB12");
    assert_eq!(membership.session_id, host);
    assert_eq!(membership.display_name, "Host");
    assert!(membership.members.is_empty());

    let code = RoomCode::parse("AB12").unwrap();
    assert_eq!(registry.room_count(), 1);
    assert_eq!(registry.room_members(&code), Some(vec![host]));
    assert_eq!(registry.session_room(&host), Some(code));
    assert_eq!(registry.session(&host).unwrap().role, Role::Host);

    // The joiner is acknowledged with the same membership it was returned.
    let acks = signaling.delivered_of_kind(&host, EnvelopeKind::Join).await;
    assert_eq!(acks.len(), 1);
    let ack: RoomMembership = acks[0].payload_as().unwrap();
    assert_eq!(ack, membership);
    assert_eq!(acks[0].sender_id, Some(host));
}

#[tokio::test]
async fn test_second_peer_sees_existing_member() {
    init_tracing();

    let (registry, signaling, _rx) = create_test_registry();

    let (host, _) = connect_and_join(&registry, "AB12", "Host", Role::Host)
        .await
        .expect("Host join failed");
    let (guest, membership) = connect_and_join(&registry, "ab12", "Guest", Role::Guest)
        .await
        .expect("Guest join failed");

    assert_eq!(
        membership.members,
        vec![Presence {
            session_id: host,
            display_name: "Host".into(),
        }]
    );

    let joined = signaling
        .delivered_of_kind(&host, EnvelopeKind::PresenceJoined)
        .await;
    assert_eq!(joined.len(), 1, "host should hear about the guest once");
    assert_eq!(joined[0].room_id.as_deref(), Some("AB12"));
    assert_eq!(joined[0].sender_id, Some(guest));
    assert_eq!(joined[0].target_id, None);

    let presence: Presence = joined[0].payload_as().unwrap();
    assert_eq!(presence.session_id, guest);
    assert_eq!(presence.display_name, "Guest");

    // The newcomer is never told about its own arrival.
    assert!(
        signaling
            .delivered_of_kind(&guest, EnvelopeKind::PresenceJoined)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_default_display_name_is_generated() {
    init_tracing();

    let (registry, _signaling, _rx) = create_test_registry();
    let (session_id, membership) = connect_and_join(&registry, "room1", "   ", Role::Guest)
        .await
        .expect("Join failed");

    assert_eq!(membership.display_name, session_id.default_display_name());
}

#[tokio::test]
async fn test_rejoin_same_room_refreshes_name_only() {
    init_tracing();

    let (registry, signaling, _rx) = create_test_registry();
    let (host, _) = connect_and_join(&registry, "AB12", "Host", Role::Host)
        .await
        .expect("Host join failed");
    let (guest, _) = connect_and_join(&registry, "AB12", "Guest", Role::Guest)
        .await
        .expect("Guest join failed");
    signaling.clear().await;

    let membership = registry
        .join(
            guest,
            "ab12",
            JoinRequest {
                display_name: Some("Renamed".into()),
                role: Role::Guest,
            },
        )
        .await
        .expect("Rejoin failed");

    assert_eq!(membership.display_name, "Renamed");
    assert_eq!(membership.members.len(), 1);
    assert_eq!(registry.session(&guest).unwrap().display_name, "Renamed");

    // No churn for the host: neither left nor joined.
    assert!(signaling.delivered_to(&host).await.is_empty());
    assert_eq!(
        signaling
            .delivered_of_kind(&guest, EnvelopeKind::Join)
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_join_other_room_leaves_current() {
    init_tracing();

    let (registry, signaling, _rx) = create_test_registry();
    let (alice, _) = connect_and_join(&registry, "AB12", "Alice", Role::Host)
        .await
        .expect("Alice join failed");
    let (bob, _) = connect_and_join(&registry, "AB12", "Bob", Role::Guest)
        .await
        .expect("Bob join failed");

    registry
        .join(alice, "CD34", JoinRequest::default())
        .await
        .expect("Switching rooms failed");

    let left = signaling
        .delivered_of_kind(&bob, EnvelopeKind::PresenceLeft)
        .await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].sender_id, Some(alice));

    let ab12 = RoomCode::parse("AB12").unwrap();
    let cd34 = RoomCode::parse("CD34").unwrap();
    assert_eq!(registry.room_members(&ab12), Some(vec![bob]));
    assert_eq!(registry.room_members(&cd34), Some(vec![alice]));
    assert_eq!(registry.session_room(&alice), Some(cd34));
}
