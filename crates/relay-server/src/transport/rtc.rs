//! webrtc-rs implementation of the transport seam

use super::{
    Background, ConnectivityState, MediaSink, MediaSource, Negotiated, PeerLink, Transport,
    TransportEvent,
};
use crate::error::TransportError;
use crate::state::{Config, TurnServer};
use async_trait::async_trait;
use relay_media::{media_kind, register_relay_codecs, RelayCodec};
use relay_protocol::{MediaKind, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::api::API;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry as InterceptorRegistry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp::packet::Packet;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;

/// Stream id shared by the relay's outbound tracks
const STREAM_ID: &str = "relay";

pub struct WebRtcTransport {
    /// WebRTC API (shared for all connections)
    api: Arc<API>,
    ice_servers: Vec<RTCIceServer>,
}

impl WebRtcTransport {
    pub fn new(stun_servers: &[String], turn_servers: &[TurnServer]) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        register_relay_codecs(&mut media_engine)?;

        let mut registry = InterceptorRegistry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(SettingEngine::default())
            .build();

        let mut ice_servers = vec![];

        for stun_url in stun_servers {
            ice_servers.push(RTCIceServer {
                urls: vec![stun_url.clone()],
                ..Default::default()
            });
        }

        for turn in turn_servers {
            ice_servers.push(RTCIceServer {
                urls: vec![turn.url.clone()],
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            });
        }

        Ok(Self {
            api: Arc::new(api),
            ice_servers,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::new(&config.stun_servers, &config.turn_servers)
    }

    /// Add an outbound track of `kind`, returning it with its RTCP reader
    ///
    /// RTCP has to be read for interceptors such as NACK to work.
    async fn add_outbound_track(
        pc: &RTCPeerConnection,
        kind: MediaKind,
    ) -> Result<(Arc<TrackLocalStaticRTP>, Background), TransportError> {
        let codec = RelayCodec::for_kind(kind);
        let track = Arc::new(TrackLocalStaticRTP::new(
            codec.capability(),
            kind.to_string(),
            STREAM_ID.to_string(),
        ));

        let sender = pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        let rtcp_reader: Background = Box::pin(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while sender.read(&mut rtcp_buf).await.is_ok() {}
            tracing::debug!("{} RTCP reader finished", kind);
        });

        Ok((track, rtcp_reader))
    }
}

#[async_trait]
impl Transport for WebRtcTransport {
    async fn negotiate(&self, offer: SessionDescription) -> Result<Negotiated, TransportError> {
        let remote = RTCSessionDescription::offer(offer.sdp)?;

        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(config).await?);
        let guard = AbandonGuard(Some(pc.clone()));

        let (audio, audio_rtcp) = Self::add_outbound_track(&pc, MediaKind::Audio).await?;
        let (video, video_rtcp) = Self::add_outbound_track(&pc, MediaKind::Video).await?;

        let (events_tx, events) = mpsc::unbounded_channel();

        let tx = events_tx.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let tx = tx.clone();
            Box::pin(async move {
                let Some(kind) = media_kind(track.kind()) else {
                    tracing::debug!("Ignoring remote track {} of unknown kind", track.id());
                    return;
                };
                tracing::info!("Received remote {} track {}", kind, track.id());
                let _ = tx.send(TransportEvent::Track {
                    kind,
                    source: Box::new(RemoteTrackSource { track }),
                });
            })
        }));

        let tx = events_tx;
        pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            let tx = tx.clone();
            Box::pin(async move {
                tracing::debug!("ICE connection state changed: {}", state);
                if let Some(state) = connectivity(state) {
                    let _ = tx.send(TransportEvent::State(state));
                }
            })
        }));

        pc.set_remote_description(remote).await?;
        let answer = pc.create_answer(None).await?;

        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(answer).await?;
        let _ = gather_complete.recv().await;

        let local = pc
            .local_description()
            .await
            .ok_or(TransportError::MissingLocalDescription)?;

        guard.disarm();
        Ok(Negotiated {
            answer: SessionDescription::answer(local.sdp),
            link: Arc::new(PeerConnectionLink { pc }),
            audio: Arc::new(LocalTrackSink { track: audio }),
            video: Arc::new(LocalTrackSink { track: video }),
            events,
            background: vec![audio_rtcp, video_rtcp],
        })
    }
}

fn connectivity(state: RTCIceConnectionState) -> Option<ConnectivityState> {
    match state {
        RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
            Some(ConnectivityState::Connected)
        }
        RTCIceConnectionState::Disconnected => Some(ConnectivityState::Disconnected),
        RTCIceConnectionState::Failed => Some(ConnectivityState::Failed),
        RTCIceConnectionState::Closed => Some(ConnectivityState::Closed),
        _ => None,
    }
}

/// Closes a peer connection whose negotiation was abandoned
struct AbandonGuard(Option<Arc<RTCPeerConnection>>);

impl AbandonGuard {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let Some(pc) = self.0.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = pc.close().await {
                    tracing::warn!("Error closing abandoned peer connection: {}", e);
                }
            });
        }
    }
}

struct PeerConnectionLink {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerLink for PeerConnectionLink {
    async fn close(&self) -> Result<(), TransportError> {
        self.pc.close().await?;
        Ok(())
    }
}

struct RemoteTrackSource {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl MediaSource for RemoteTrackSource {
    async fn recv(&mut self) -> Result<Packet, TransportError> {
        let (packet, _attributes) = self.track.read_rtp().await?;
        Ok(packet)
    }
}

struct LocalTrackSink {
    track: Arc<TrackLocalStaticRTP>,
}

#[async_trait]
impl MediaSink for LocalTrackSink {
    async fn write(&self, packet: &Packet) -> Result<(), TransportError> {
        self.track.write_rtp(packet).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ice_states_map_to_connectivity() {
        assert_eq!(
            connectivity(RTCIceConnectionState::Completed),
            Some(ConnectivityState::Connected)
        );
        assert_eq!(
            connectivity(RTCIceConnectionState::Disconnected),
            Some(ConnectivityState::Disconnected)
        );
        assert_eq!(
            connectivity(RTCIceConnectionState::Failed),
            Some(ConnectivityState::Failed)
        );
        assert_eq!(connectivity(RTCIceConnectionState::Checking), None);
    }

    #[tokio::test]
    async fn garbage_offer_is_a_transport_error() {
        let transport = WebRtcTransport::new(&[], &[]).unwrap();
        let result = transport
            .negotiate(SessionDescription::offer("this is not sdp"))
            .await;
        assert!(result.is_err());
    }
}
