mod media_transport;
mod webrtc_transport;

pub use media_transport::{LinkEvent, MediaLink, MediaSource, MediaTransport};
pub use webrtc_transport::WebRtcTransport;
