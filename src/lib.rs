//! WebRTC viewer session negotiation over a signaling relay
//!
//! This crate establishes a live media connection between a viewer and a
//! single named producer peer. The viewer registers with the signaling relay
//! as a listener, requests a session with the producer, answers the
//! producer's SDP offer, trickles ICE candidates through the relay, and
//! hands arriving remote media tracks to a caller-supplied sink. Rendering,
//! media codecs, and ICE/DTLS/SRTP internals are out of scope; they belong
//! to the sink and the underlying `webrtc` stack.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  caller ──open()──► SignalingSession (event loop)    │
//! │                      ├─ ControlChannel (WebSocket)   │
//! │                      ├─ PeerLink (RTCPeerConnection) │
//! │                      └─ MediaSink (caller-supplied)  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Both capabilities sit behind traits, so the state machine can be
//! exercised with injected fakes and no live transport.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stream_viewer::{LogSink, SessionCallbacks, SignalingSession, ViewerConfig};
//!
//! # async fn example() {
//! let config = ViewerConfig::new("ws://relay.example.com:8443");
//! let callbacks = SessionCallbacks::new()
//!     .with_on_connected(|| println!("media flowing"))
//!     .with_on_error(|err| eprintln!("session error: {}", err));
//!
//! let handle = SignalingSession::open(Arc::new(LogSink), config, "producer-1", callbacks);
//!
//! // ... later: the only release path.
//! handle.close();
//! # }
//! ```
//!
//! A session never heals itself: after `on_error` or `on_disconnected` the
//! caller closes the handle and opens a new session if it wants to retry.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod sink;

// Re-exports for public API
pub use config::{TurnServerConfig, ViewerConfig};
pub use error::{Error, Result};
pub use peer::{PeerConnector, PeerEvent, PeerLink, PeerLinkState, WebRtcConnector};
pub use session::{
    SessionCallbacks, SessionEvent, SessionHandle, SessionState, SignalingSession,
};
pub use signaling::{
    ControlChannel, ControlConnector, ControlMessage, IceCandidateDescriptor, PeerMeta, PeerRole,
    SdpKind, SessionDescription, WebSocketConnector,
};
pub use sink::{LogSink, MediaKind, MediaSink, RemoteMedia};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
