use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::mesh::{MeshEvent, MeshHandle};
use crate::peer::{LinkHandle, LinkState, LinkUpdate, PeerLink};
use crate::signaling_client::SignalingClient;
use crate::transport::{MediaSource, MediaTransport};
use huddle_core::{
    ChatMessage, Envelope, EnvelopeKind, ErrorReport, JoinRequest, Presence, RoomCode,
    RoomMembership, SessionId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub(crate) enum MeshCommand {
    Join {
        room: RoomCode,
        reply: oneshot::Sender<Result<RoomMembership, ClientError>>,
    },
    Leave {
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Chat {
        text: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    SetLocalMedia {
        source: MediaSource,
        reply: oneshot::Sender<()>,
    },
    Membership {
        reply: oneshot::Sender<Option<RoomMembership>>,
    },
    LinkStates {
        reply: oneshot::Sender<HashMap<SessionId, LinkState>>,
    },
    Shutdown,
}

/// Actor that keeps one [`PeerLink`] per remote member of the current room.
///
/// Existing members offer to newcomers: a `presence-joined` makes this side
/// the offerer, while an `offer` from an unknown sender creates an answering
/// link. The link map is owned by the actor task alone.
pub struct MeshCoordinator {
    transport: Arc<dyn MediaTransport>,
    join_request: JoinRequest,
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    commands: mpsc::UnboundedReceiver<MeshCommand>,
    updates_tx: mpsc::UnboundedSender<LinkUpdate>,
    updates_rx: mpsc::UnboundedReceiver<LinkUpdate>,
    events: mpsc::UnboundedSender<MeshEvent>,
    links: HashMap<SessionId, LinkHandle>,
    membership: Option<RoomMembership>,
    pending_join: Option<oneshot::Sender<Result<RoomMembership, ClientError>>>,
    local_media: MediaSource,
}

impl MeshCoordinator {
    /// Starts the coordinator over an already connected pair of signaling
    /// channels.
    pub fn spawn(
        join_request: JoinRequest,
        transport: Arc<dyn MediaTransport>,
        outbound: mpsc::UnboundedSender<Envelope>,
        inbound: mpsc::UnboundedReceiver<Envelope>,
    ) -> (MeshHandle, mpsc::UnboundedReceiver<MeshEvent>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            transport,
            join_request,
            outbound,
            inbound,
            commands,
            updates_tx,
            updates_rx,
            events,
            links: HashMap::new(),
            membership: None,
            pending_join: None,
            local_media: MediaSource::default(),
        };
        tokio::spawn(coordinator.run());

        (MeshHandle::new(command_tx), event_rx)
    }

    /// Opens the websocket named in `config` and starts a coordinator on it.
    pub async fn connect(
        config: &ClientConfig,
        transport: Arc<dyn MediaTransport>,
    ) -> anyhow::Result<(MeshHandle, mpsc::UnboundedReceiver<MeshEvent>)> {
        let (outbound, inbound) = SignalingClient::connect(&config.signaling_url)
            .await?
            .into_channels();
        Ok(Self::spawn(
            config.join_request(),
            transport,
            outbound,
            inbound,
        ))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(MeshCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                envelope = self.inbound.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => {
                        warn!("Signaling connection closed");
                        self.close_all_links().await;
                        self.emit(MeshEvent::SignalingClosed);
                        break;
                    }
                },
                Some(update) = self.updates_rx.recv() => self.handle_link_update(update),
            }
        }

        self.close_all_links().await;
        debug!("Mesh coordinator stopped");
    }

    async fn handle_command(&mut self, command: MeshCommand) {
        match command {
            MeshCommand::Join { room, reply } => {
                if self.pending_join.is_some() {
                    let _ = reply.send(Err(ClientError::JoinPending));
                    return;
                }

                let switching = self
                    .membership
                    .as_ref()
                    .is_some_and(|m| m.room_id != room);
                if switching {
                    // The relay leaves the old room for us.
                    self.close_all_links().await;
                    self.membership = None;
                }

                let envelope = Envelope::join(room.as_str(), &self.join_request);
                match self.send(envelope) {
                    Ok(()) => self.pending_join = Some(reply),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            MeshCommand::Leave { reply } => {
                self.close_all_links().await;
                let was_in_room = self.membership.take().is_some();
                let result = self.send(Envelope::leave());
                if was_in_room && result.is_ok() {
                    info!("Left room");
                    self.emit(MeshEvent::Left);
                }
                let _ = reply.send(result);
            }
            MeshCommand::Chat { text, reply } => {
                let result = if self.membership.is_some() {
                    self.send(Envelope::chat(text))
                } else {
                    Err(ClientError::NotInRoom)
                };
                let _ = reply.send(result);
            }
            MeshCommand::SetLocalMedia { source, reply } => {
                info!("Switching local media to {}", source);
                self.local_media = source;
                for link in self.links.values() {
                    link.set_local_media(source);
                }
                let _ = reply.send(());
            }
            MeshCommand::Membership { reply } => {
                let _ = reply.send(self.membership.clone());
            }
            MeshCommand::LinkStates { reply } => {
                let states = self
                    .links
                    .iter()
                    .map(|(remote, link)| (*remote, link.state()))
                    .collect();
                let _ = reply.send(states);
            }
            MeshCommand::Shutdown => {}
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        let room_scoped = matches!(
            envelope.kind,
            EnvelopeKind::PresenceJoined
                | EnvelopeKind::PresenceLeft
                | EnvelopeKind::Offer
                | EnvelopeKind::Answer
                | EnvelopeKind::Candidate
                | EnvelopeKind::Chat
        );
        if room_scoped && !self.in_current_room(&envelope) {
            debug!(
                "Dropping `{}` for room {:?}, not the current room",
                envelope.kind, envelope.room_id
            );
            return;
        }

        match envelope.kind {
            EnvelopeKind::Join => match envelope.payload_as::<RoomMembership>() {
                Ok(membership) => self.on_joined(membership),
                Err(e) => warn!("Bad join acknowledgement: {}", e),
            },
            EnvelopeKind::PresenceJoined => match envelope.payload_as::<Presence>() {
                Ok(presence) => self.on_presence_joined(presence).await,
                Err(e) => warn!("Bad presence-joined: {}", e),
            },
            EnvelopeKind::PresenceLeft => match envelope.payload_as::<Presence>() {
                Ok(presence) => self.on_presence_left(presence).await,
                Err(e) => warn!("Bad presence-left: {}", e),
            },
            EnvelopeKind::Offer | EnvelopeKind::Answer | EnvelopeKind::Candidate => {
                self.route_to_link(envelope)
            }
            EnvelopeKind::Chat => {
                let Some(sender) = envelope.sender_id else {
                    warn!("Dropping chat without sender");
                    return;
                };
                match envelope.payload_as::<ChatMessage>() {
                    Ok(message) => self.emit(MeshEvent::Chat {
                        sender,
                        text: message.text,
                    }),
                    Err(e) => warn!("Bad chat from {}: {}", sender, e),
                }
            }
            EnvelopeKind::Error => match envelope.payload_as::<ErrorReport>() {
                Ok(report) => self.on_error(report),
                Err(e) => warn!("Bad error report: {}", e),
            },
            EnvelopeKind::Leave => debug!("Ignoring `leave` from relay"),
        }
    }

    fn on_joined(&mut self, membership: RoomMembership) {
        info!(
            "Joined room {} as {} with {} member(s) present",
            membership.room_id,
            membership.session_id,
            membership.members.len()
        );

        // Members already present will offer to us; nothing to start here.
        self.membership = Some(membership.clone());
        if let Some(reply) = self.pending_join.take() {
            let _ = reply.send(Ok(membership.clone()));
        }
        self.emit(MeshEvent::Joined(membership));
    }

    async fn on_presence_joined(&mut self, presence: Presence) {
        if self.local_id() == Some(presence.session_id) {
            return;
        }
        info!(
            "{} ({}) joined, offering",
            presence.display_name, presence.session_id
        );

        let remote = presence.session_id;
        self.emit(MeshEvent::PeerJoined(presence));

        if let Some(stale) = self.links.remove(&remote) {
            stale.close().await;
        }
        let link = self.open_link(remote);
        link.offer();
        self.links.insert(remote, link);
    }

    async fn on_presence_left(&mut self, presence: Presence) {
        info!("{} ({}) left", presence.display_name, presence.session_id);
        if let Some(link) = self.links.remove(&presence.session_id) {
            link.close().await;
        }
        self.emit(MeshEvent::PeerLeft(presence));
    }

    fn route_to_link(&mut self, envelope: Envelope) {
        let Some(remote) = envelope.sender_id else {
            warn!("Dropping `{}` without sender", envelope.kind);
            return;
        };

        if let Some(link) = self.links.get(&remote) {
            link.signal(envelope);
            return;
        }

        if envelope.kind != EnvelopeKind::Offer {
            debug!("Dropping `{}` from {} with no link", envelope.kind, remote);
            return;
        }

        debug!("Offer from {}, answering", remote);
        let link = self.open_link(remote);
        link.signal(envelope);
        self.links.insert(remote, link);
    }

    fn on_error(&mut self, report: ErrorReport) {
        warn!("Relay reported {}: {}", report.code, report.message);
        match self.pending_join.take() {
            Some(reply) => {
                let _ = reply.send(Err(ClientError::Rejected {
                    code: report.code,
                    message: report.message,
                }));
            }
            None => self.emit(MeshEvent::Error(report)),
        }
    }

    fn handle_link_update(&mut self, update: LinkUpdate) {
        match update {
            LinkUpdate::StateChanged { remote, state } => {
                self.emit(MeshEvent::LinkStateChanged { remote, state })
            }
            LinkUpdate::Failed { remote, reason } => {
                self.emit(MeshEvent::LinkFailed { remote, reason })
            }
        }
    }

    fn open_link(&self, remote: SessionId) -> LinkHandle {
        let link = PeerLink::spawn(
            remote,
            self.transport.clone(),
            self.outbound.clone(),
            self.updates_tx.clone(),
        );
        if self.local_media != MediaSource::default() {
            link.set_local_media(self.local_media);
        }
        link
    }

    async fn close_all_links(&mut self) {
        for (remote, link) in self.links.drain() {
            debug!("Closing link to {}", remote);
            link.close().await;
        }
    }

    /// Whether `envelope` was relayed within the room this side is in now.
    /// Envelopes still in flight from a room we left must not open links.
    fn in_current_room(&self, envelope: &Envelope) -> bool {
        let Some(membership) = &self.membership else {
            return false;
        };
        envelope
            .room_id
            .as_deref()
            .and_then(|room| RoomCode::parse(room).ok())
            .is_some_and(|room| room == membership.room_id)
    }

    fn local_id(&self) -> Option<SessionId> {
        self.membership.as_ref().map(|m| m.session_id)
    }

    fn send(&self, envelope: Envelope) -> Result<(), ClientError> {
        self.outbound
            .send(envelope)
            .map_err(|_| ClientError::SignalingClosed)
    }

    fn emit(&self, event: MeshEvent) {
        let _ = self.events.send(event);
    }
}
