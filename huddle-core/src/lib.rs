//! Wire model shared by the huddle relay server and mesh clients.

pub mod error;
pub mod model;

pub use error::{EnvelopeError, RoomCodeError};
pub use model::*;
