use crate::error::RegistryError;
use crate::room::{Room, Session};
use crate::signaling::{RelayDispatcher, SignalingOutput, fan_out};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_core::{
    Envelope, EnvelopeError, EnvelopeKind, JoinRequest, Presence, RoomCode, RoomMembership,
    SessionId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns every active room and session on the relay.
///
/// A session's `room` field and the room's member set change together while
/// the session's map entry is held, and always in that lock order (session,
/// then room). Nothing awaits while an entry is held.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomCode, Room>>,
    sessions: Arc<DashMap<SessionId, Session>>,
    signaling: Arc<dyn SignalingOutput>,
}

impl RoomRegistry {
    pub fn new(signaling: Arc<dyn SignalingOutput>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            sessions: Arc::new(DashMap::new()),
            signaling,
        }
    }

    /// Registers a freshly connected transport session.
    pub fn connect(&self, session_id: SessionId) {
        self.sessions
            .entry(session_id)
            .or_insert_with(|| Session::new(session_id));
        info!("Session {} connected", session_id);
    }

    /// Entry point for every envelope a client sends. Failures are reported
    /// to that client as an `error` envelope.
    pub async fn handle_envelope(&self, session_id: SessionId, envelope: Envelope) {
        let kind = envelope.kind;

        let result = match kind {
            EnvelopeKind::Join => self.handle_join(session_id, envelope).await.map(|_| ()),
            EnvelopeKind::Leave => {
                self.leave(session_id).await;
                Ok(())
            }
            _ => self.relay(session_id, envelope).await,
        };

        let Err(e) = result else {
            return;
        };
        warn!("Rejected `{}` from {}: {}", kind, session_id, e);

        let report = Envelope::error(e.code(), e.to_string());
        if let Err(e) = self.signaling.deliver(session_id, report).await {
            warn!("Could not report error to {}: {}", session_id, e);
        }
    }

    async fn handle_join(
        &self,
        session_id: SessionId,
        envelope: Envelope,
    ) -> Result<RoomMembership, RegistryError> {
        let room_id = envelope
            .room_id
            .as_deref()
            .ok_or(EnvelopeError::MissingRoom)?;
        let request = if envelope.payload.is_null() {
            JoinRequest::default()
        } else {
            envelope.payload_as()?
        };

        self.join(session_id, room_id, request).await
    }

    /// Binds the session to `room_id`, creating the room if needed.
    ///
    /// The joiner gets a `join` acknowledgement listing the members already
    /// present; those members get `presence-joined`. Joining another room
    /// first leaves the current one. Re-joining the current room only
    /// refreshes the display name.
    pub async fn join(
        &self,
        session_id: SessionId,
        room_id: &str,
        request: JoinRequest,
    ) -> Result<RoomMembership, RegistryError> {
        let code = RoomCode::parse(room_id)?;

        if self.session_room(&session_id).as_ref() == Some(&code) {
            return Ok(self.rejoin(session_id, &code, request).await);
        }
        self.leave(session_id).await;

        let role = request.role;
        let (presence, existing) = self.bind(session_id, &code, request)?;

        info!(
            "Session {} ({}) joined room {} with {} other member(s)",
            session_id,
            presence.display_name,
            code,
            existing.len()
        );

        let membership = RoomMembership {
            room_id: code.clone(),
            session_id,
            display_name: presence.display_name.clone(),
            role,
            members: self.presences(&existing),
        };

        // The acknowledgement goes out before any existing member can react
        // to `presence-joined`, so the joiner knows its room before offers
        // arrive.
        let ack = Envelope::join_ack(&membership);
        let mut unreachable = fan_out(&*self.signaling, vec![session_id], &ack).await;

        let announcement = Envelope::presence_joined(&presence).in_room(&code);
        unreachable.extend(fan_out(&*self.signaling, existing, &announcement).await);

        self.settle(unreachable).await;
        Ok(membership)
    }

    async fn rejoin(
        &self,
        session_id: SessionId,
        code: &RoomCode,
        request: JoinRequest,
    ) -> RoomMembership {
        let (display_name, role) = match self.sessions.get_mut(&session_id) {
            Some(mut session) => {
                if let Some(name) = clean_display_name(request.display_name) {
                    session.display_name = name;
                }
                (session.display_name.clone(), session.role)
            }
            None => (session_id.default_display_name(), request.role),
        };

        let others: Vec<SessionId> = self
            .room_members(code)
            .unwrap_or_default()
            .into_iter()
            .filter(|id| *id != session_id)
            .collect();

        debug!("Session {} re-joined room {}", session_id, code);

        let membership = RoomMembership {
            room_id: code.clone(),
            session_id,
            display_name,
            role,
            members: self.presences(&others),
        };

        let unreachable = fan_out(
            &*self.signaling,
            vec![session_id],
            &Envelope::join_ack(&membership),
        )
        .await;
        self.settle(unreachable).await;

        membership
    }

    /// Unbinds the session from its room. Leaving while in no room is a no-op.
    pub async fn leave(&self, session_id: SessionId) {
        let unreachable = self.leave_inner(session_id).await;
        self.settle(unreachable).await;
    }

    /// Transport-level disconnect: the session record is dropped first and
    /// its room is cleaned up from that record, so a `join` racing with the
    /// removal either lands before it or is refused.
    pub async fn disconnect(&self, session_id: SessionId) {
        let unreachable = self.remove_session(session_id).await.unwrap_or_default();
        self.settle(unreachable).await;
    }

    /// Forwards a directed or chat envelope within the sender's room. The
    /// payload is never inspected; `senderId` and `roomId` are stamped from
    /// the sender's session.
    pub async fn relay(
        &self,
        sender: SessionId,
        mut envelope: Envelope,
    ) -> Result<(), RegistryError> {
        envelope.validate()?;

        let code = self
            .session_room(&sender)
            .ok_or(RegistryError::NotInRoom(sender))?;

        if let Some(claimed) = envelope.room_id.as_deref() {
            if RoomCode::parse(claimed).ok().as_ref() != Some(&code) {
                return Err(RegistryError::NotInRoom(sender));
            }
        }

        let members = self.room_members(&code).unwrap_or_default();
        let recipients = RelayDispatcher::resolve_recipients(sender, &envelope, &members)?;

        envelope.sender_id = Some(sender);
        envelope.room_id = Some(code.to_string());

        debug!(
            "Relaying `{}` from {} to {} recipient(s) in {}",
            envelope.kind,
            sender,
            recipients.len(),
            code
        );

        let unreachable = fan_out(&*self.signaling, recipients, &envelope).await;
        self.settle(unreachable).await;
        Ok(())
    }

    pub fn session_room(&self, session_id: &SessionId) -> Option<RoomCode> {
        self.sessions
            .get(session_id)
            .and_then(|session| session.room.clone())
    }

    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.get(session_id).map(|session| session.clone())
    }

    pub fn room(&self, code: &RoomCode) -> Option<Room> {
        self.rooms.get(code).map(|room| room.clone())
    }

    pub fn room_members(&self, code: &RoomCode) -> Option<Vec<SessionId>> {
        self.rooms.get(code).map(|room| room.members())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Binds the session to `code` and adds it to the room while the
    /// session entry is held. Returns the members that were already there.
    fn bind(
        &self,
        session_id: SessionId,
        code: &RoomCode,
        request: JoinRequest,
    ) -> Result<(Presence, Vec<SessionId>), RegistryError> {
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(RegistryError::UnknownSession(session_id))?;
        if let Some(name) = clean_display_name(request.display_name) {
            session.display_name = name;
        }
        session.role = request.role;
        session.room = Some(code.clone());

        let existing = match self.rooms.entry(code.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get().members();
                entry.get_mut().insert(session_id);
                existing
            }
            Entry::Vacant(entry) => {
                info!("Creating new room: {}", code);
                let mut room = Room::new(code.clone());
                room.insert(session_id);
                entry.insert(room);
                Vec::new()
            }
        };

        Ok((session.presence(), existing))
    }

    /// Removes the session from the room's member set, deleting the room
    /// once empty. Returns the members left behind.
    fn unbind(&self, session_id: SessionId, code: &RoomCode) -> Vec<SessionId> {
        match self.rooms.entry(code.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(&session_id);
                if entry.get().is_empty() {
                    entry.remove();
                    info!("Room {} is empty, deleting", code);
                    Vec::new()
                } else {
                    entry.get().members()
                }
            }
            Entry::Vacant(_) => Vec::new(),
        }
    }

    async fn leave_inner(&self, session_id: SessionId) -> Vec<SessionId> {
        let (code, presence, remaining) = {
            let Some(mut session) = self.sessions.get_mut(&session_id) else {
                return Vec::new();
            };
            let Some(code) = session.room.take() else {
                return Vec::new();
            };
            let remaining = self.unbind(session_id, &code);
            (code, session.presence(), remaining)
        };

        self.announce_departure(&code, &presence, remaining).await
    }

    /// Drops the session record. `None` when it was already gone.
    async fn remove_session(&self, session_id: SessionId) -> Option<Vec<SessionId>> {
        let (_, mut session) = self.sessions.remove(&session_id)?;
        info!("Session {} disconnected", session_id);

        let Some(code) = session.room.take() else {
            return Some(Vec::new());
        };
        let remaining = self.unbind(session_id, &code);
        Some(
            self.announce_departure(&code, &session.presence(), remaining)
                .await,
        )
    }

    async fn announce_departure(
        &self,
        code: &RoomCode,
        presence: &Presence,
        remaining: Vec<SessionId>,
    ) -> Vec<SessionId> {
        info!("Session {} left room {}", presence.session_id, code);

        let announcement = Envelope::presence_left(presence).in_room(code);
        fan_out(&*self.signaling, remaining, &announcement).await
    }

    /// Sessions whose outbound channel failed are treated as disconnected.
    /// Their own `presence-left` may surface more unreachable sessions, so
    /// this drains a work list instead of recursing.
    async fn settle(&self, mut pending: Vec<SessionId>) {
        while let Some(session_id) = pending.pop() {
            let Some(more) = self.remove_session(session_id).await else {
                continue;
            };
            warn!(
                "Session {} was unreachable, treated as disconnected",
                session_id
            );
            pending.extend(more);
        }
    }

    fn presences(&self, ids: &[SessionId]) -> Vec<Presence> {
        ids.iter()
            .filter_map(|id| self.sessions.get(id).map(|session| session.presence()))
            .collect()
    }
}

fn clean_display_name(name: Option<String>) -> Option<String> {
    let name = name?;
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
