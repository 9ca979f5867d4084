use crate::error::EnvelopeError;
use crate::model::payload::{ChatMessage, ErrorReport, JoinRequest, Presence, RoomMembership};
use crate::model::{RoomCode, SessionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    Join,
    Leave,
    PresenceJoined,
    PresenceLeft,
    Offer,
    Answer,
    Candidate,
    Chat,
    /// Relay-to-client report of a rejected request.
    Error,
}

impl EnvelopeKind {
    /// Directed kinds are routed to `targetId` only.
    pub fn is_directed(self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::Candidate)
    }

    /// Broadcast kinds fan out to every other member of the sender's room.
    pub fn is_broadcast(self) -> bool {
        matches!(self, Self::PresenceJoined | Self::PresenceLeft | Self::Chat)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::PresenceJoined => "presence-joined",
            Self::PresenceLeft => "presence-left",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
            Self::Chat => "chat",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signaling message. `payload` is opaque to the relay and forwarded as is.
///
/// Clients may omit `roomId` (except on `join`) and `senderId`; the relay
/// stamps both from the connection's session before forwarding, overwriting
/// whatever the client supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<SessionId>,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    fn new(kind: EnvelopeKind, payload: Value) -> Self {
        Self {
            kind,
            room_id: None,
            sender_id: None,
            target_id: None,
            payload,
        }
    }

    fn with_payload<T: Serialize>(kind: EnvelopeKind, payload: &T) -> Self {
        // Payload records are plain structs of strings and ids; serializing
        // them into a `Value` cannot fail.
        let value = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self::new(kind, value)
    }

    pub fn join(room_code: &str, request: &JoinRequest) -> Self {
        let mut envelope = Self::with_payload(EnvelopeKind::Join, request);
        envelope.room_id = Some(room_code.to_owned());
        envelope
    }

    pub fn join_ack(membership: &RoomMembership) -> Self {
        Self::with_payload(EnvelopeKind::Join, membership)
            .in_room(&membership.room_id)
            .from_sender(membership.session_id)
    }

    pub fn leave() -> Self {
        Self::new(EnvelopeKind::Leave, Value::Null)
    }

    pub fn presence_joined(presence: &Presence) -> Self {
        Self::with_payload(EnvelopeKind::PresenceJoined, presence).from_sender(presence.session_id)
    }

    pub fn presence_left(presence: &Presence) -> Self {
        Self::with_payload(EnvelopeKind::PresenceLeft, presence).from_sender(presence.session_id)
    }

    pub fn offer(target: SessionId, description: Value) -> Self {
        Self::new(EnvelopeKind::Offer, description).to_target(target)
    }

    pub fn answer(target: SessionId, description: Value) -> Self {
        Self::new(EnvelopeKind::Answer, description).to_target(target)
    }

    pub fn candidate(target: SessionId, candidate: Value) -> Self {
        Self::new(EnvelopeKind::Candidate, candidate).to_target(target)
    }

    pub fn chat(text: impl Into<String>) -> Self {
        Self::with_payload(EnvelopeKind::Chat, &ChatMessage { text: text.into() })
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::with_payload(
            EnvelopeKind::Error,
            &ErrorReport {
                code: code.to_owned(),
                message: message.into(),
            },
        )
    }

    pub fn in_room(mut self, room: &RoomCode) -> Self {
        self.room_id = Some(room.to_string());
        self
    }

    pub fn from_sender(mut self, sender: SessionId) -> Self {
        self.sender_id = Some(sender);
        self
    }

    pub fn to_target(mut self, target: SessionId) -> Self {
        self.target_id = Some(target);
        self
    }

    /// Checks the addressing rules: directed kinds carry a target, broadcast
    /// kinds never do, `join` names a room.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.kind.is_directed() && self.target_id.is_none() {
            return Err(EnvelopeError::MissingTarget(self.kind));
        }
        if !self.kind.is_directed() && self.target_id.is_some() {
            return Err(EnvelopeError::UnexpectedTarget(self.kind));
        }
        if self.kind == EnvelopeKind::Join && self.room_id.is_none() {
            return Err(EnvelopeError::MissingRoom);
        }
        Ok(())
    }

    /// Parses and validates one text frame.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_str(text)?;
        envelope.validate()?;
        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Interprets the payload. Only endpoints call this, never the relay.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        T::deserialize(&self.payload).map_err(|source| EnvelopeError::Payload {
            kind: self.kind,
            source,
        })
    }
}
