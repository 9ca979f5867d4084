use async_trait::async_trait;
use huddle_core::{Envelope, EnvelopeKind, SessionId};
use huddle_server::{DeliveryError, SignalingOutput};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// One envelope handed to the transport layer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub session_id: SessionId,
    pub envelope: Envelope,
}

/// Mock SignalingOutput that captures every delivery.
#[derive(Clone)]
pub struct MockSignalingOutput {
    /// Channel to stream captured deliveries.
    tx: mpsc::UnboundedSender<Delivery>,
    /// All captured deliveries (for verification).
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    /// Sessions whose outbound channel behaves as closed.
    unreachable: Arc<Mutex<HashSet<SessionId>>>,
}

impl MockSignalingOutput {
    /// Create a new MockSignalingOutput and its receiver channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            deliveries: Arc::new(Mutex::new(Vec::new())),
            unreachable: Arc::new(Mutex::new(HashSet::new())),
        };
        (signaling, rx)
    }

    /// Create a MockSignalingOutput without a receiver (deliveries are only stored).
    pub fn new_stored_only() -> Self {
        let (signaling, _rx) = Self::new();
        signaling
    }

    /// Make every further delivery to `session_id` fail.
    pub async fn mark_unreachable(&self, session_id: SessionId) {
        self.unreachable.lock().await.insert(session_id);
    }

    /// All envelopes delivered to a session, in delivery order.
    pub async fn delivered_to(&self, session_id: &SessionId) -> Vec<Envelope> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter(|d| &d.session_id == session_id)
            .map(|d| d.envelope.clone())
            .collect()
    }

    /// Envelopes of one kind delivered to a session.
    pub async fn delivered_of_kind(
        &self,
        session_id: &SessionId,
        kind: EnvelopeKind,
    ) -> Vec<Envelope> {
        self.delivered_to(session_id)
            .await
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    pub async fn total(&self) -> usize {
        self.deliveries.lock().await.len()
    }

    pub async fn clear(&self) {
        self.deliveries.lock().await.clear();
    }
}

impl Default for MockSignalingOutput {
    fn default() -> Self {
        Self::new_stored_only()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn deliver(
        &self,
        session_id: SessionId,
        envelope: Envelope,
    ) -> Result<(), DeliveryError> {
        tracing::debug!("[MockSignaling] deliver `{}` to {}", envelope.kind, session_id);

        if self.unreachable.lock().await.contains(&session_id) {
            return Err(DeliveryError::ChannelClosed(session_id));
        }

        let delivery = Delivery {
            session_id,
            envelope,
        };
        self.deliveries.lock().await.push(delivery.clone());
        let _ = self.tx.send(delivery);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signaling_captures_delivery() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let session_id = SessionId::new();

        signaling
            .deliver(session_id, Envelope::chat("hello"))
            .await
            .unwrap();

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.session_id, session_id);
        assert_eq!(signaling.delivered_to(&session_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_signaling_fails_unreachable() {
        let signaling = MockSignalingOutput::new_stored_only();
        let session_id = SessionId::new();
        signaling.mark_unreachable(session_id).await;

        let result = signaling.deliver(session_id, Envelope::chat("x")).await;
        assert_eq!(result, Err(DeliveryError::ChannelClosed(session_id)));
        assert_eq!(signaling.total().await, 0);
    }
}
