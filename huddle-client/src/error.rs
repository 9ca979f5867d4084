use crate::peer::LinkState;
use huddle_core::{EnvelopeKind, RoomCodeError};
use thiserror::Error;

/// Failure inside a media transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    WebRtc(#[from] webrtc::Error),

    #[error("malformed description or candidate: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("media link is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The envelope does not fit the link's current state. The state is
    /// left as it was.
    #[error("unexpected `{kind}` while {state}")]
    UnexpectedMessage { state: LinkState, kind: EnvelopeKind },

    #[error("cannot start an offer while {0}")]
    NotIdle(LinkState),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors surfaced through [`MeshHandle`](crate::MeshHandle).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    InvalidRoomCode(#[from] RoomCodeError),

    #[error("not in a room")]
    NotInRoom,

    #[error("relay rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("a join is already waiting for the relay")]
    JoinPending,

    #[error("signaling connection is closed")]
    SignalingClosed,

    #[error("mesh coordinator has stopped")]
    CoordinatorStopped,
}
