use huddle_core::{Envelope, EnvelopeKind, Role, RoomCode};

use crate::integration::{create_test_registry, init_tracing};
use crate::utils::connect_and_join;

#[tokio::test]
async fn test_room_isolation() {
    init_tracing();

    let (registry, signaling, _rx) = create_test_registry();

    let (a1, _) = connect_and_join(&registry, "AB12", "A1", Role::Host)
        .await
        .expect("A1 join failed");
    let (a2, _) = connect_and_join(&registry, "AB12", "A2", Role::Guest)
        .await
        .expect("A2 join failed");
    let (b1, b1_membership) = connect_and_join(&registry, "CD34", "B1", Role::Host)
        .await
        .expect("B1 join failed");
    let (b2, _) = connect_and_join(&registry, "CD34", "B2", Role::Guest)
        .await
        .expect("B2 join failed");

    assert!(b1_membership.members.is_empty(), "CD34 must start empty");
    assert_eq!(registry.room_count(), 2);

    registry
        .relay(a1, Envelope::chat("only for AB12"))
        .await
        .unwrap();
    registry
        .relay(b2, Envelope::chat("only for CD34"))
        .await
        .unwrap();
    registry.leave(a2).await;

    for id in [b1, b2] {
        for envelope in signaling.delivered_to(&id).await {
            assert_ne!(envelope.sender_id, Some(a1));
            assert_ne!(envelope.sender_id, Some(a2));
            assert_ne!(envelope.room_id.as_deref(), Some("AB12"));
        }
    }
    for id in [a1, a2] {
        for envelope in signaling.delivered_to(&id).await {
            assert_ne!(envelope.sender_id, Some(b1));
            assert_ne!(envelope.sender_id, Some(b2));
        }
    }

    let b1_chats = signaling.delivered_of_kind(&b1, EnvelopeKind::Chat).await;
    assert_eq!(b1_chats.len(), 1);
    assert_eq!(b1_chats[0].payload["text"], "only for CD34");

    let ab = RoomCode::parse("AB12").unwrap();
    let cd = RoomCode::parse("CD34").unwrap();
    assert_eq!(registry.room_members(&ab), Some(vec![a1]));
    assert_eq!(registry.room_members(&cd).map(|m| m.len()), Some(2));
}
