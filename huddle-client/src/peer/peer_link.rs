use crate::error::NegotiationError;
use crate::peer::LinkState;
use crate::peer::negotiator::Negotiator;
use crate::transport::{LinkEvent, MediaSource, MediaTransport};
use huddle_core::{Envelope, SessionId};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Progress reported by a link task to its coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkUpdate {
    StateChanged { remote: SessionId, state: LinkState },
    Failed { remote: SessionId, reason: String },
}

enum LinkCommand {
    Offer,
    Signal(Envelope),
    SetLocalMedia(MediaSource),
}

enum Step {
    Command(LinkCommand),
    Event(LinkEvent),
}

/// Owner's side of a running link task.
pub struct LinkHandle {
    remote: SessionId,
    commands: mpsc::UnboundedSender<LinkCommand>,
    state: watch::Receiver<LinkState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LinkHandle {
    pub fn remote(&self) -> SessionId {
        self.remote
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Makes this side the offerer. Only valid on an idle link.
    pub fn offer(&self) -> bool {
        self.commands.send(LinkCommand::Offer).is_ok()
    }

    /// Hands an `offer`, `answer` or `candidate` from the remote side to the
    /// link.
    pub fn signal(&self, envelope: Envelope) -> bool {
        self.commands.send(LinkCommand::Signal(envelope)).is_ok()
    }

    pub fn set_local_media(&self, source: MediaSource) -> bool {
        self.commands.send(LinkCommand::SetLocalMedia(source)).is_ok()
    }

    /// Cancels whatever the link is awaiting, drops its candidate queue and
    /// closes the media link. Returns once the task has finished.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Link task for {} ended abnormally: {}", self.remote, e);
        }
    }
}

pub struct PeerLink;

impl PeerLink {
    /// Starts the link task for `remote`. Envelopes it produces go to
    /// `outbound`; state changes are reported on `updates`.
    pub fn spawn(
        remote: SessionId,
        transport: Arc<dyn MediaTransport>,
        outbound: mpsc::UnboundedSender<Envelope>,
        updates: mpsc::UnboundedSender<LinkUpdate>,
    ) -> LinkHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_link(
            remote,
            transport,
            outbound,
            updates,
            state_tx,
            command_rx,
            shutdown_rx,
        ));

        LinkHandle {
            remote,
            commands: command_tx,
            state: state_rx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

async fn run_link(
    remote: SessionId,
    transport: Arc<dyn MediaTransport>,
    outbound: mpsc::UnboundedSender<Envelope>,
    updates: mpsc::UnboundedSender<LinkUpdate>,
    state_tx: watch::Sender<LinkState>,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (event_tx, mut events) = mpsc::unbounded_channel();

    let opened = tokio::select! {
        _ = cancelled(&mut shutdown) => None,
        opened = transport.open_link(remote, event_tx) => Some(opened),
    };
    let link = match opened {
        Some(Ok(link)) => link,
        Some(Err(e)) => {
            let reason = format!("could not open media link: {}", e);
            warn!("Link to {}: {}", remote, reason);
            publish(&state_tx, &updates, remote, LinkState::Failed);
            let _ = updates.send(LinkUpdate::Failed { remote, reason });
            cancelled(&mut shutdown).await;
            publish(&state_tx, &updates, remote, LinkState::Closed);
            return;
        }
        None => {
            publish(&state_tx, &updates, remote, LinkState::Closed);
            return;
        }
    };

    let mut negotiator = Negotiator::new(remote, link, outbound, state_tx, updates);

    loop {
        // Transport events first: a `Connected` raised while answering must
        // land before the next envelope from the remote side.
        let step = tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => break,
            Some(event) = events.recv() => Step::Event(event),
            command = commands.recv() => match command {
                Some(command) => Step::Command(command),
                None => break,
            },
        };

        let result = tokio::select! {
            _ = cancelled(&mut shutdown) => break,
            result = apply(&mut negotiator, step) => result,
        };

        match result {
            Ok(()) => {}
            Err(e @ (NegotiationError::UnexpectedMessage { .. } | NegotiationError::NotIdle(_))) => {
                warn!("Link to {}: {}", remote, e);
            }
            Err(e) => negotiator.fail(e.to_string()),
        }
    }

    debug!("Tearing down {} link to {}", negotiator.state(), remote);
    negotiator.close().await;
}

async fn apply(negotiator: &mut Negotiator, step: Step) -> Result<(), NegotiationError> {
    match step {
        Step::Command(LinkCommand::Offer) => negotiator.start_offer().await,
        Step::Command(LinkCommand::Signal(envelope)) => negotiator.handle_envelope(envelope).await,
        Step::Command(LinkCommand::SetLocalMedia(source)) => {
            negotiator.set_local_media(source).await
        }
        Step::Event(event) => negotiator.handle_link_event(event).await,
    }
}

/// Resolves once teardown is requested or the owner is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn publish(
    state_tx: &watch::Sender<LinkState>,
    updates: &mpsc::UnboundedSender<LinkUpdate>,
    remote: SessionId,
    state: LinkState,
) {
    state_tx.send_replace(state);
    let _ = updates.send(LinkUpdate::StateChanged { remote, state });
}
