//! Media sink seam between the session and the caller's renderer

use std::sync::Arc;
use tracing::info;
use webrtc::track::track_remote::TrackRemote;

/// Kind of a remote media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
    /// Kind not reported by the capability
    Unknown,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A remote media track surfaced by the peer-connection capability
///
/// `track` is populated when the capability is the real WebRTC stack;
/// injected fakes leave it `None`.
#[derive(Clone)]
pub struct RemoteMedia {
    /// Track kind
    pub kind: MediaKind,

    /// Underlying RTP track, when available
    pub track: Option<Arc<TrackRemote>>,
}

impl std::fmt::Debug for RemoteMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMedia")
            .field("kind", &self.kind)
            .field("has_track", &self.track.is_some())
            .finish()
    }
}

/// Renderable target for remote media
///
/// The session binds every remote track it observes to the sink; what
/// happens to the media afterwards (decoding, rendering) is the caller's
/// concern.
pub trait MediaSink: Send + Sync {
    /// Bind a remote track to this sink
    fn attach(&self, media: RemoteMedia);
}

/// Sink that only logs track arrivals
///
/// Useful as a placeholder target when no renderer is wired up yet.
#[derive(Debug, Default)]
pub struct LogSink;

impl MediaSink for LogSink {
    fn attach(&self, media: RemoteMedia) {
        info!(kind = %media.kind, "remote track attached");
    }
}
