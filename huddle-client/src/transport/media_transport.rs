use crate::error::TransportError;
use async_trait::async_trait;
use huddle_core::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// What the local side is sending on its video track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    #[default]
    Camera,
    Screen,
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => f.write_str("camera"),
            Self::Screen => f.write_str("screen"),
        }
    }
}

/// Asynchronous notifications a media link pushes to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A locally gathered candidate hint, to be sent to the remote side.
    LocalCandidate(Value),
    /// A media path to the remote side is established.
    Connected,
    Failed(String),
}

/// Factory for per-peer media links.
///
/// Descriptions and candidates cross this seam as opaque JSON so the relay
/// and the negotiation logic never depend on a particular media stack.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn open_link(
        &self,
        remote: SessionId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Box<dyn MediaLink>, TransportError>;
}

/// One media connection to one remote participant.
#[async_trait]
pub trait MediaLink: Send + Sync {
    /// Produces a local offer and installs it as the local description.
    async fn create_offer(&self) -> Result<Value, TransportError>;

    async fn apply_remote_description(&self, description: Value) -> Result<(), TransportError>;

    /// Produces a local answer to the applied remote offer and installs it.
    async fn create_answer(&self) -> Result<Value, TransportError>;

    async fn add_remote_candidate(&self, candidate: Value) -> Result<(), TransportError>;

    /// Switches the outgoing video source. The caller renegotiates afterwards.
    async fn set_local_media(&self, source: MediaSource) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}
