//! Error types for viewer session negotiation

/// Result type alias using viewer session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating a viewer session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// WebSocket transport error on the control channel
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Failure sending or encoding a control message
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Error reported by the signaling relay itself.
    ///
    /// Display is the bare `details` string from the relay, so callers
    /// observe exactly what the relay said.
    #[error("{0}")]
    Relay(String),

    /// SDP negotiation error (parse, apply, answer synthesis)
    #[error("SDP negotiation error: {0}")]
    Sdp(String),

    /// ICE candidate error
    #[error("ICE candidate error: {0}")]
    IceCandidate(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error came from the control-channel transport
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_) | Error::Signaling(_) | Error::Io(_)
        )
    }

    /// Check if this error came from SDP/ICE negotiation
    pub fn is_negotiation(&self) -> bool {
        matches!(
            self,
            Error::Sdp(_) | Error::IceCandidate(_) | Error::PeerConnection(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}
