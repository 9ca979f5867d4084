mod link_state;
mod negotiator;
mod peer_link;

pub use link_state::LinkState;
pub use peer_link::{LinkHandle, LinkUpdate, PeerLink};
