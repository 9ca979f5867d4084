use crate::error::NegotiationError;
use crate::peer::{LinkState, LinkUpdate};
use crate::transport::{LinkEvent, MediaLink, MediaSource};
use huddle_core::{Envelope, EnvelopeKind, SessionId};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Offer/answer/candidate sequencing for one remote participant.
///
/// Owned by exactly one link task; every method runs to completion before
/// the next envelope is looked at.
pub(crate) struct Negotiator {
    remote: SessionId,
    state: LinkState,
    link: Box<dyn MediaLink>,
    outbound: mpsc::UnboundedSender<Envelope>,
    state_tx: watch::Sender<LinkState>,
    updates: mpsc::UnboundedSender<LinkUpdate>,
    /// Remote candidates that arrived before any remote description.
    pending_candidates: VecDeque<Value>,
    remote_description_set: bool,
    /// Media change requested before the link was connected.
    deferred_media: Option<MediaSource>,
}

impl Negotiator {
    pub(crate) fn new(
        remote: SessionId,
        link: Box<dyn MediaLink>,
        outbound: mpsc::UnboundedSender<Envelope>,
        state_tx: watch::Sender<LinkState>,
        updates: mpsc::UnboundedSender<LinkUpdate>,
    ) -> Self {
        Self {
            remote,
            state: LinkState::Idle,
            link,
            outbound,
            state_tx,
            updates,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
            deferred_media: None,
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) async fn start_offer(&mut self) -> Result<(), NegotiationError> {
        if self.state != LinkState::Idle {
            return Err(NegotiationError::NotIdle(self.state));
        }

        self.set_state(LinkState::Offering);
        let description = self.link.create_offer().await?;
        self.send(Envelope::offer(self.remote, description));
        self.set_state(LinkState::OfferSent);
        Ok(())
    }

    pub(crate) async fn handle_envelope(
        &mut self,
        envelope: Envelope,
    ) -> Result<(), NegotiationError> {
        match envelope.kind {
            EnvelopeKind::Offer => self.handle_offer(envelope.payload).await,
            EnvelopeKind::Answer => self.handle_answer(envelope.payload).await,
            EnvelopeKind::Candidate => self.handle_candidate(envelope.payload).await,
            kind => Err(self.unexpected(kind)),
        }
    }

    pub(crate) async fn handle_link_event(
        &mut self,
        event: LinkEvent,
    ) -> Result<(), NegotiationError> {
        match event {
            LinkEvent::LocalCandidate(candidate) => {
                if !self.state.is_finished() {
                    self.send(Envelope::candidate(self.remote, candidate));
                }
                Ok(())
            }
            LinkEvent::Connected => match self.state {
                LinkState::Idle
                | LinkState::OfferSent
                | LinkState::AnswerPending
                | LinkState::Answered => self.mark_connected().await,
                _ => Ok(()),
            },
            LinkEvent::Failed(reason) => {
                self.fail(reason);
                Ok(())
            }
        }
    }

    /// Switches local media on a connected link, or remembers the request
    /// until the link connects.
    pub(crate) async fn set_local_media(
        &mut self,
        source: MediaSource,
    ) -> Result<(), NegotiationError> {
        match self.state {
            LinkState::Connected => self.renegotiate(source).await,
            state if state.is_finished() => {
                debug!("Ignoring media change on {} link to {}", state, self.remote);
                Ok(())
            }
            _ => {
                debug!("Deferring switch to {} until {} connects", source, self.remote);
                self.deferred_media = Some(source);
                Ok(())
            }
        }
    }

    pub(crate) fn fail(&mut self, reason: String) {
        if self.state.is_finished() {
            return;
        }
        error!("Link to {} failed: {}", self.remote, reason);
        self.set_state(LinkState::Failed);
        let _ = self.updates.send(LinkUpdate::Failed {
            remote: self.remote,
            reason,
        });
    }

    pub(crate) async fn close(&mut self) {
        self.pending_candidates.clear();
        self.deferred_media = None;
        if self.state == LinkState::Closed {
            return;
        }
        if let Err(e) = self.link.close().await {
            warn!("Error closing link to {}: {}", self.remote, e);
        }
        self.set_state(LinkState::Closed);
    }

    async fn handle_offer(&mut self, description: Value) -> Result<(), NegotiationError> {
        let settled = match self.state {
            LinkState::Idle => {
                self.set_state(LinkState::AnswerPending);
                LinkState::Answered
            }
            // An offer while `answered` means the remote applied our answer
            // and already renegotiates, ahead of our own transport.
            LinkState::Connected | LinkState::Answered => {
                self.set_state(LinkState::Renegotiating);
                LinkState::Connected
            }
            _ => return Err(self.unexpected(EnvelopeKind::Offer)),
        };

        self.apply_remote_description(description).await?;
        let answer = self.link.create_answer().await?;
        self.send(Envelope::answer(self.remote, answer));

        if settled == LinkState::Connected {
            self.mark_connected().await
        } else {
            self.set_state(settled);
            Ok(())
        }
    }

    async fn handle_answer(&mut self, description: Value) -> Result<(), NegotiationError> {
        if !matches!(self.state, LinkState::OfferSent | LinkState::Renegotiating) {
            return Err(self.unexpected(EnvelopeKind::Answer));
        }

        self.apply_remote_description(description).await?;
        self.mark_connected().await
    }

    async fn handle_candidate(&mut self, candidate: Value) -> Result<(), NegotiationError> {
        if self.state.is_finished() {
            debug!("Dropping candidate from {} on {} link", self.remote, self.state);
            return Ok(());
        }

        if self.remote_description_set {
            self.link.add_remote_candidate(candidate).await?;
        } else {
            self.pending_candidates.push_back(candidate);
            debug!(
                "Queued candidate from {} ({} pending)",
                self.remote,
                self.pending_candidates.len()
            );
        }
        Ok(())
    }

    async fn apply_remote_description(&mut self, description: Value) -> Result<(), NegotiationError> {
        self.link.apply_remote_description(description).await?;
        self.remote_description_set = true;

        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.link.add_remote_candidate(candidate).await?;
        }
        Ok(())
    }

    async fn mark_connected(&mut self) -> Result<(), NegotiationError> {
        self.set_state(LinkState::Connected);
        match self.deferred_media.take() {
            Some(source) => self.renegotiate(source).await,
            None => Ok(()),
        }
    }

    async fn renegotiate(&mut self, source: MediaSource) -> Result<(), NegotiationError> {
        self.set_state(LinkState::Renegotiating);
        self.link.set_local_media(source).await?;
        let description = self.link.create_offer().await?;
        self.send(Envelope::offer(self.remote, description));
        Ok(())
    }

    fn unexpected(&self, kind: EnvelopeKind) -> NegotiationError {
        NegotiationError::UnexpectedMessage {
            state: self.state,
            kind,
        }
    }

    fn send(&self, envelope: Envelope) {
        if self.outbound.send(envelope).is_err() {
            warn!("Signaling channel closed, dropping envelope for {}", self.remote);
        }
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state == state {
            return;
        }
        info!("Link to {}: {} -> {}", self.remote, self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
        let _ = self.updates.send(LinkUpdate::StateChanged {
            remote: self.remote,
            state,
        });
    }
}
