//! Signaling relay: room registry, relay dispatcher and websocket endpoint.

mod app;
mod config;
mod error;
mod room;
mod signaling;

pub use app::*;
pub use config::ServerConfig;
pub use error::{DeliveryError, RegistryError};
pub use room::*;
pub use signaling::*;
