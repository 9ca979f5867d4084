pub use huddle_core::{Envelope, EnvelopeKind, RoomCode, SessionId};

pub mod model {
    pub use huddle_core::model::*;
    pub use huddle_core::{EnvelopeError, RoomCodeError};
}

#[cfg(feature = "server")]
pub mod server {
    pub use huddle_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use huddle_client::*;
}
