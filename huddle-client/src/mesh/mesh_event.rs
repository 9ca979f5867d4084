use crate::peer::LinkState;
use huddle_core::{ErrorReport, Presence, RoomMembership, SessionId};

/// What the application hears from the mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    /// The relay acknowledged our `join`.
    Joined(RoomMembership),
    PeerJoined(Presence),
    PeerLeft(Presence),
    LinkStateChanged { remote: SessionId, state: LinkState },
    /// Negotiation with one peer failed. Other links are unaffected.
    LinkFailed { remote: SessionId, reason: String },
    Chat { sender: SessionId, text: String },
    /// We left the room; every link has been closed.
    Left,
    /// The relay rejected something we sent.
    Error(ErrorReport),
    SignalingClosed,
}
