use crate::error::TransportError;
use crate::transport::{LinkEvent, MediaLink, MediaSource, MediaTransport};
use async_trait::async_trait;
use huddle_core::{IceServerConfig, SessionId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const STREAM_ID: &str = "huddle";

/// Local tracks shared by every link. A capture pipeline writes samples into
/// them once and each bound peer connection forwards them.
#[derive(Clone)]
struct LocalTracks {
    camera: Arc<TrackLocalStaticSample>,
    screen: Arc<TrackLocalStaticSample>,
    microphone: Arc<TrackLocalStaticSample>,
}

impl LocalTracks {
    fn new() -> Self {
        let video = |id: &str| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    ..Default::default()
                },
                id.to_owned(),
                STREAM_ID.to_owned(),
            ))
        };

        Self {
            camera: video("camera"),
            screen: video("screen"),
            microphone: Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    ..Default::default()
                },
                "microphone".to_owned(),
                STREAM_ID.to_owned(),
            )),
        }
    }

    fn video(&self, source: MediaSource) -> Arc<dyn TrackLocal + Send + Sync> {
        match source {
            MediaSource::Camera => self.camera.clone(),
            MediaSource::Screen => self.screen.clone(),
        }
    }
}

/// [`MediaTransport`] backed by the `webrtc` crate.
pub struct WebRtcTransport {
    api: API,
    ice_servers: Vec<RTCIceServer>,
    tracks: LocalTracks,
}

impl WebRtcTransport {
    pub fn new(ice_servers: &[IceServerConfig]) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        Ok(Self {
            api,
            ice_servers,
            tracks: LocalTracks::new(),
        })
    }

    pub fn camera_track(&self) -> Arc<TrackLocalStaticSample> {
        self.tracks.camera.clone()
    }

    pub fn screen_track(&self) -> Arc<TrackLocalStaticSample> {
        self.tracks.screen.clone()
    }

    pub fn microphone_track(&self) -> Arc<TrackLocalStaticSample> {
        self.tracks.microphone.clone()
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn open_link(
        &self,
        remote: SessionId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Box<dyn MediaLink>, TransportError> {
        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };
        let peer_connection = Arc::new(self.api.new_peer_connection(config).await?);

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection to {} is {:?}", remote, state);
                    match state {
                        RTCPeerConnectionState::Connected => {
                            let _ = tx.send(LinkEvent::Connected);
                        }
                        RTCPeerConnectionState::Failed => {
                            let _ = tx.send(LinkEvent::Failed("peer connection failed".into()));
                        }
                        _ => {}
                    }
                })
            },
        ));

        let ice_tx = events;
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                match serde_json::to_value(&init) {
                    Ok(value) => {
                        let _ = tx.send(LinkEvent::LocalCandidate(value));
                    }
                    Err(e) => warn!("Could not encode local candidate: {}", e),
                }
            })
        }));

        let video_sender = peer_connection
            .add_track(self.tracks.video(MediaSource::Camera))
            .await?;
        let audio_sender = peer_connection
            .add_track(self.tracks.microphone.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        drain_rtcp(video_sender.clone());
        drain_rtcp(audio_sender);

        debug!("Opened webrtc link to {}", remote);
        Ok(Box::new(WebRtcLink {
            peer_connection,
            video_sender,
            tracks: self.tracks.clone(),
        }))
    }
}

/// Interceptors only run while someone reads RTCP from the sender.
fn drain_rtcp(sender: Arc<RTCRtpSender>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        while sender.read(&mut buf).await.is_ok() {}
    });
}

struct WebRtcLink {
    peer_connection: Arc<RTCPeerConnection>,
    video_sender: Arc<RTCRtpSender>,
    tracks: LocalTracks,
}

#[async_trait]
impl MediaLink for WebRtcLink {
    async fn create_offer(&self) -> Result<Value, TransportError> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(serde_json::to_value(&offer)?)
    }

    async fn apply_remote_description(&self, description: Value) -> Result<(), TransportError> {
        let description: RTCSessionDescription = serde_json::from_value(description)?;
        self.peer_connection
            .set_remote_description(description)
            .await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<Value, TransportError> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(serde_json::to_value(&answer)?)
    }

    async fn add_remote_candidate(&self, candidate: Value) -> Result<(), TransportError> {
        let candidate: RTCIceCandidateInit = serde_json::from_value(candidate)?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn set_local_media(&self, source: MediaSource) -> Result<(), TransportError> {
        self.video_sender
            .replace_track(Some(self.tracks.video(source)))
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
