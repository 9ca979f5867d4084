mod envelope;
mod ice_server;
mod payload;
mod room;
mod session;

pub use envelope::{Envelope, EnvelopeKind};
pub use ice_server::IceServerConfig;
pub use payload::{ChatMessage, ErrorReport, JoinRequest, Presence, Role, RoomMembership};
pub use room::RoomCode;
pub use session::SessionId;
