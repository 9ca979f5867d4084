use crate::model::EnvelopeKind;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomCodeError {
    #[error("room code must be 4-8 characters long, got {0}")]
    Length(usize),

    #[error("room code may only contain ASCII letters and digits")]
    Charset,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("`{0}` envelope requires a targetId")]
    MissingTarget(EnvelopeKind),

    #[error("`{0}` envelope must not carry a targetId")]
    UnexpectedTarget(EnvelopeKind),

    #[error("`join` envelope requires a roomId")]
    MissingRoom,

    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: EnvelopeKind,
        source: serde_json::Error,
    },
}
