//! Viewer session negotiation
//!
//! Owns the control channel to the signaling relay and, once a session is
//! granted, a single peer connection to the producer.

pub mod session;

pub use session::{SessionCallbacks, SessionHandle, SignalingSession};

use crate::peer::PeerEvent;
use crate::signaling::ControlMessage;
use crate::Error;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Control channel opening
    Connecting,
    /// Registered with the relay, session requested
    AwaitingGrant,
    /// Session granted, peer connection negotiating
    Negotiating,
    /// First remote media track observed
    Connected,
    /// Terminal; reachable from any state
    Closed,
}

/// Events serialized through the session's queue
///
/// All state transitions happen on these; each event is handled to
/// completion before the next is dispatched, so the state machine needs no
/// locking of its own.
#[derive(Debug)]
pub enum SessionEvent {
    /// Message received on the control channel
    Control(ControlMessage),

    /// Transport error on the control channel
    ChannelError(Error),

    /// Control channel closed by the remote side
    ChannelClosed,

    /// Event from the peer-connection capability
    Peer(PeerEvent),
}
