//! Wire protocol for the signaling relay
//!
//! Text-encoded structured records exchanged with the relay over the control
//! channel. The relay routes session-setup and ICE/SDP messages between the
//! viewer and the producer without carrying media itself.

use serde::{Deserialize, Serialize};

/// Role a peer announces to the relay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Media-consuming peer (the viewer)
    Listener,
    /// Media-originating peer
    Producer,
}

/// Metadata attached to a peer registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerMeta {
    /// Human-readable peer name
    pub name: String,
}

/// SDP document kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Session description offered by the initiating side
    Offer,
    /// Session description answering an offer
    Answer,
}

/// SDP offer/answer relayed between peers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    /// Document kind
    #[serde(rename = "type")]
    pub kind: SdpKind,

    /// SDP body
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate relayed between peers
///
/// Opaque to this crate beyond routing; the fields mirror what the
/// peer-connection capability produces and consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateDescriptor {
    /// Candidate line
    pub candidate: String,

    /// Index of the media description the candidate belongs to
    pub sdp_m_line_index: u16,

    /// Media stream identification tag
    pub sdp_mid: String,
}

/// Messages exchanged with the signaling relay over the control channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Viewer registration, sent once when the control channel opens
    SetPeerStatus {
        /// Roles this peer takes
        roles: Vec<PeerRole>,
        /// Peer metadata
        meta: PeerMeta,
    },

    /// Request a session with a named producer peer
    #[serde(rename_all = "camelCase")]
    StartSession {
        /// Identity of the target producer
        peer_id: String,
    },

    /// Relay grant of a requested session
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        /// Opaque token identifying the granted session
        session_id: String,
    },

    /// SDP or ICE payload relayed between the session's two peers
    #[serde(rename_all = "camelCase")]
    Peer {
        /// Session the payload belongs to
        session_id: String,

        /// SDP body, when the payload carries a description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sdp: Option<SessionDescription>,

        /// ICE candidate, when the payload carries one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ice: Option<IceCandidateDescriptor>,
    },

    /// Error reported by the relay
    Error {
        /// Human-readable failure details
        details: String,
    },
}

impl ControlMessage {
    /// Convert message to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::Serialization(format!("Failed to serialize control message: {}", e))
        })
    }

    /// Parse message from JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::Serialization(format!("Failed to deserialize control message: {}", e))
        })
    }
}
