use huddle_core::{EnvelopeError, EnvelopeKind, RoomCodeError, SessionId};
use thiserror::Error;

/// Recoverable failures of a registry operation. Each one is reported back to
/// the session that caused it and never touches other sessions or rooms.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid room code: {0}")]
    InvalidRoomCode(#[from] RoomCodeError),

    #[error("session {0} is not in a room")]
    NotInRoom(SessionId),

    #[error("session {0} is no longer connected")]
    UnknownSession(SessionId),

    #[error("session {0} is not a member of the sender's room")]
    UnknownTarget(SessionId),

    #[error("`{0}` envelopes are not accepted from clients")]
    NotRelayable(EnvelopeKind),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl RegistryError {
    /// Stable code carried in the `error` envelope sent to the client.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRoomCode(_) => "invalid-room-code",
            Self::NotInRoom(_) | Self::UnknownSession(_) => "not-in-room",
            Self::UnknownTarget(_) => "unknown-target",
            Self::NotRelayable(_) | Self::Envelope(_) => "malformed-envelope",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no outbound channel for session {0}")]
    UnknownSession(SessionId),

    #[error("outbound channel for session {0} is closed")]
    ChannelClosed(SessionId),
}
