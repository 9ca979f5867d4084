use crate::error::{DeliveryError, RegistryError};
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use huddle_core::{Envelope, EnvelopeError, EnvelopeKind, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct DispatcherInner {
    sessions: DashMap<SessionId, mpsc::UnboundedSender<Envelope>>,
}

/// Owns the outbound channel of every connected session and forwards
/// envelopes to them unchanged.
#[derive(Clone)]
pub struct RelayDispatcher {
    inner: Arc<DispatcherInner>,
}

impl RelayDispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                sessions: DashMap::new(),
            }),
        }
    }

    pub fn add_session(&self, session_id: SessionId, tx: mpsc::UnboundedSender<Envelope>) {
        self.inner.sessions.insert(session_id, tx);
    }

    pub fn remove_session(&self, session_id: &SessionId) {
        self.inner.sessions.remove(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn send_envelope(
        &self,
        session_id: SessionId,
        envelope: Envelope,
    ) -> Result<(), DeliveryError> {
        let Some(tx) = self.inner.sessions.get(&session_id) else {
            return Err(DeliveryError::UnknownSession(session_id));
        };
        tx.send(envelope)
            .map_err(|_| DeliveryError::ChannelClosed(session_id))
    }

    /// Resolves who receives `envelope` from `sender`, given a snapshot of the
    /// sender's room. Directed envelopes go to their target only and only if
    /// it is in the room; chat goes to every other member.
    pub fn resolve_recipients(
        sender: SessionId,
        envelope: &Envelope,
        room_members: &[SessionId],
    ) -> Result<Vec<SessionId>, RegistryError> {
        match envelope.kind {
            kind if kind.is_directed() => {
                let target = envelope
                    .target_id
                    .ok_or(EnvelopeError::MissingTarget(kind))?;
                if !room_members.contains(&target) {
                    return Err(RegistryError::UnknownTarget(target));
                }
                Ok(vec![target])
            }
            EnvelopeKind::Chat => Ok(room_members
                .iter()
                .copied()
                .filter(|id| *id != sender)
                .collect()),
            // presence-* is emitted by the registry itself; join/leave have
            // their own operations.
            kind => Err(RegistryError::NotRelayable(kind)),
        }
    }
}

impl Default for RelayDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingOutput for RelayDispatcher {
    async fn deliver(
        &self,
        session_id: SessionId,
        envelope: Envelope,
    ) -> Result<(), DeliveryError> {
        self.send_envelope(session_id, envelope)
    }
}

/// Sends `envelope` to every recipient concurrently and returns the sessions
/// that could not be reached.
pub async fn fan_out(
    output: &dyn SignalingOutput,
    recipients: Vec<SessionId>,
    envelope: &Envelope,
) -> Vec<SessionId> {
    let sends = recipients.into_iter().map(|recipient| {
        let envelope = envelope.clone();
        async move {
            debug!("Relaying `{}` to {}", envelope.kind, recipient);
            match output.deliver(recipient, envelope).await {
                Ok(()) => None,
                Err(e) => {
                    warn!("Delivery failed: {}", e);
                    Some(recipient)
                }
            }
        }
    });

    join_all(sends).await.into_iter().flatten().collect()
}
