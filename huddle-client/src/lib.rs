//! Mesh client: joins a room through the relay and negotiates one media link
//! per remote participant.

pub mod config;
pub mod error;
pub mod mesh;
pub mod peer;
pub mod signaling_client;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, NegotiationError, TransportError};
pub use mesh::{MeshCoordinator, MeshEvent, MeshHandle};
pub use peer::{LinkHandle, LinkState, LinkUpdate, PeerLink};
pub use signaling_client::SignalingClient;
pub use transport::{LinkEvent, MediaLink, MediaSource, MediaTransport, WebRtcTransport};
