use crate::error::DeliveryError;
use async_trait::async_trait;
use huddle_core::{Envelope, SessionId};

/// Outbound side of the transport layer, as seen by the room registry.
///
/// Implemented by [`RelayDispatcher`](crate::RelayDispatcher) for live
/// websocket sessions and by capture mocks in tests.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Hand one envelope to a session's outbound channel. No retries.
    async fn deliver(&self, session_id: SessionId, envelope: Envelope)
    -> Result<(), DeliveryError>;
}
