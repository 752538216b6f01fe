//! WebRTC implementation of the peer-connection capability

use crate::config::ViewerConfig;
use crate::peer::{PeerConnector, PeerEvent, PeerLink, PeerLinkState};
use crate::session::SessionEvent;
use crate::signaling::IceCandidateDescriptor;
use crate::sink::{MediaKind, RemoteMedia};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

/// Connector producing [`WebRtcPeerLink`]s
#[derive(Debug, Default)]
pub struct WebRtcConnector;

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        config: &ViewerConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn PeerLink>> {
        let link = WebRtcPeerLink::connect(config, events).await?;
        Ok(Arc::new(link))
    }
}

/// Peer connection backed by `webrtc::RTCPeerConnection`
///
/// Registers the three session observers (remote track, local candidate,
/// connection state) before the connection is handed out, and buffers remote
/// candidates that arrive before the remote description is applied, since the
/// underlying crate rejects early candidates instead of queueing them the
/// way browser peer connections do.
pub struct WebRtcPeerLink {
    peer_connection: Arc<RTCPeerConnection>,

    /// Remote candidates received before the remote description
    pending_candidates: Mutex<Vec<IceCandidateDescriptor>>,
}

impl WebRtcPeerLink {
    /// Create a peer connection and wire its observers to `events`
    pub async fn connect(
        config: &ViewerConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::PeerConnection(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry = register_default_interceptors(Default::default(), &mut media_engine)
            .map_err(|e| Error::PeerConnection(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers(config),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| Error::PeerConnection(format!("Failed to create peer connection: {}", e)))?,
        );

        // Remote-track observer
        let tx = events.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let kind = match track.kind() {
                RTPCodecType::Audio => MediaKind::Audio,
                RTPCodecType::Video => MediaKind::Video,
                _ => MediaKind::Unknown,
            };
            debug!(%kind, "remote track observed");
            let _ = tx.send(SessionEvent::Peer(PeerEvent::Track(RemoteMedia {
                kind,
                track: Some(track),
            })));
            Box::pin(async {})
        }));

        // Local-candidate observer
        let tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            match candidate {
                Some(c) => match c.to_json() {
                    Ok(init) => {
                        let descriptor = IceCandidateDescriptor {
                            candidate: init.candidate,
                            sdp_m_line_index: init.sdp_mline_index.unwrap_or(0),
                            sdp_mid: init.sdp_mid.unwrap_or_default(),
                        };
                        let _ = tx.send(SessionEvent::Peer(PeerEvent::LocalCandidate(descriptor)));
                    }
                    Err(e) => warn!("Failed to encode local candidate: {}", e),
                },
                // The null candidate marks gathering completion and produces
                // no message on the control channel.
                None => debug!("local candidate gathering completed"),
            }
            Box::pin(async {})
        }));

        // Connection-state observer
        let tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                debug!("peer connection state changed to {:?}", s);
                let mapped = match s {
                    RTCPeerConnectionState::Connecting => Some(PeerLinkState::Connecting),
                    RTCPeerConnectionState::Connected => Some(PeerLinkState::Connected),
                    RTCPeerConnectionState::Disconnected => Some(PeerLinkState::Disconnected),
                    RTCPeerConnectionState::Failed => Some(PeerLinkState::Failed),
                    RTCPeerConnectionState::Closed => Some(PeerLinkState::Closed),
                    _ => None,
                };
                if let Some(state) = mapped {
                    let _ = tx.send(SessionEvent::Peer(PeerEvent::StateChange(state)));
                }
                Box::pin(async {})
            },
        ));

        Ok(Self {
            peer_connection,
            pending_candidates: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PeerLink for WebRtcPeerLink {
    async fn apply_offer(&self, sdp: &str) -> Result<()> {
        let offer = RTCSessionDescription::offer(sdp.to_string())
            .map_err(|e| Error::Sdp(format!("Failed to parse offer: {}", e)))?;

        self.peer_connection
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set remote description: {}", e)))?;

        // Flush candidates that trickled in ahead of the offer. Late or
        // malformed entries must not abort the session.
        let pending: Vec<_> = self.pending_candidates.lock().await.drain(..).collect();
        for candidate in pending {
            if let Err(e) = self.add_candidate_now(candidate).await {
                debug!("Failed to apply buffered candidate: {}", e);
            }
        }

        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to create answer: {}", e)))?;

        self.peer_connection
            .set_local_description(answer)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set local description: {}", e)))?;

        let local_desc = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| Error::Sdp("No local description after setting answer".to_string()))?;

        Ok(local_desc.sdp)
    }

    async fn add_remote_candidate(&self, candidate: IceCandidateDescriptor) -> Result<()> {
        if self.peer_connection.remote_description().await.is_none() {
            debug!("Remote description not set yet, buffering candidate");
            self.pending_candidates.lock().await.push(candidate);
            return Ok(());
        }

        self.add_candidate_now(candidate).await
    }

    async fn close(&self) {
        if let Err(e) = self.peer_connection.close().await {
            debug!("Error closing peer connection: {}", e);
        }
    }
}

impl WebRtcPeerLink {
    async fn add_candidate_now(&self, candidate: IceCandidateDescriptor) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: Some(candidate.sdp_mid),
            sdp_mline_index: Some(candidate.sdp_m_line_index),
            username_fragment: None,
        };

        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::IceCandidate(format!("Failed to add ICE candidate: {}", e)))
    }
}

/// Build the ICE server list from the configured STUN and TURN entries
fn ice_servers(config: &ViewerConfig) -> Vec<RTCIceServer> {
    config
        .stun_servers
        .iter()
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .chain(config.turn_servers.iter().map(|turn| {
            #[allow(clippy::needless_update)]
            RTCIceServer {
                urls: vec![turn.url.clone()],
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            }
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TurnServerConfig;

    #[test]
    fn test_ice_servers_from_config() {
        let config = ViewerConfig::default().with_turn_servers(vec![TurnServerConfig {
            url: "turn:turn.example.com:3478".to_string(),
            username: "user".to_string(),
            credential: "pass".to_string(),
        }]);

        let servers = ice_servers(&config);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].urls, vec!["stun:stun.l.google.com:19302"]);
        assert_eq!(servers[1].username, "user");
    }

    #[tokio::test]
    async fn test_connect_creates_link() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let link = WebRtcPeerLink::connect(&ViewerConfig::default(), tx)
            .await
            .unwrap();

        link.close().await;
    }

    #[tokio::test]
    async fn test_early_candidate_is_buffered() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let link = WebRtcPeerLink::connect(&ViewerConfig::default(), tx)
            .await
            .unwrap();

        // No remote description yet: the candidate must be accepted, not
        // rejected by the underlying connection.
        let result = link
            .add_remote_candidate(IceCandidateDescriptor {
                candidate: "candidate:1 1 UDP 2122252543 192.0.2.1 49203 typ host".to_string(),
                sdp_m_line_index: 0,
                sdp_mid: "video0".to_string(),
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(link.pending_candidates.lock().await.len(), 1);

        link.close().await;
    }

    #[tokio::test]
    async fn test_malformed_offer_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let link = WebRtcPeerLink::connect(&ViewerConfig::default(), tx)
            .await
            .unwrap();

        let result = link.apply_offer("not an sdp document").await;
        assert!(matches!(result, Err(Error::Sdp(_))));

        link.close().await;
    }
}
