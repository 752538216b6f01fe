//! Peer-connection capability behind the session
//!
//! The session drives negotiation through the [`PeerLink`] trait and never
//! touches the WebRTC stack directly, so the state machine can be exercised
//! with an injected fake capability.

pub mod connection;

pub use connection::{WebRtcConnector, WebRtcPeerLink};

use crate::config::ViewerConfig;
use crate::session::SessionEvent;
use crate::signaling::IceCandidateDescriptor;
use crate::sink::RemoteMedia;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Aggregate connection state reported by the peer capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerLinkState {
    /// Connection negotiation in progress
    Connecting,
    /// Connection established successfully
    Connected,
    /// Connection lost
    Disconnected,
    /// Connection failed
    Failed,
    /// Connection closed
    Closed,
}

/// Events the peer capability delivers back to the session
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A remote media track was observed
    Track(RemoteMedia),

    /// A local ICE candidate was discovered.
    ///
    /// Gathering completion (the null candidate) produces no event.
    LocalCandidate(IceCandidateDescriptor),

    /// The aggregate connection state changed
    StateChange(PeerLinkState),
}

/// Handle to a live peer connection
///
/// Offer/answer application and candidate routing; remote-track arrival,
/// local-candidate discovery, and state changes are delivered as
/// [`PeerEvent`]s through the session's event queue.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Apply the producer's SDP offer as the remote description
    async fn apply_offer(&self, sdp: &str) -> Result<()>;

    /// Synthesize a local answer, apply it as the local description, and
    /// return its SDP body
    async fn create_answer(&self) -> Result<String>;

    /// Add an ICE candidate trickled by the producer.
    ///
    /// Candidates arriving before the remote description is applied must be
    /// accepted (buffered) rather than rejected.
    async fn add_remote_candidate(&self, candidate: IceCandidateDescriptor) -> Result<()>;

    /// Release the connection, suppressing any errors raised during release
    async fn close(&self);
}

/// Factory for peer connections; the injection seam for fakes
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a peer connection with the configured ICE servers and wire its
    /// observers to `events`
    async fn connect(
        &self,
        config: &ViewerConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn PeerLink>>;
}
