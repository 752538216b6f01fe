//! Relay wire protocol and control channel
//!
//! The relay routes session-setup and ICE/SDP control messages between the
//! viewer and the producer; media never touches it.

pub mod channel;
pub mod protocol;

pub use channel::{ControlChannel, ControlConnector, WebSocketConnector, WebSocketControlChannel};
pub use protocol::{
    ControlMessage, IceCandidateDescriptor, PeerMeta, PeerRole, SdpKind, SessionDescription,
};
