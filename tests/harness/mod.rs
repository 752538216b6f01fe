//! Test doubles for exercising the session state machine without a live
//! relay or WebRTC stack.
//!
//! The fakes capture the session's event sender on connect, so tests can
//! play the relay and the peer capability by injecting events directly.

#![allow(dead_code)] // Not every test file uses every helper

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_viewer::{
    ControlChannel, ControlConnector, ControlMessage, Error, IceCandidateDescriptor, MediaKind,
    MediaSink, PeerConnector, PeerLink, RemoteMedia, Result, SessionCallbacks, SessionDescription,
    SessionEvent, SessionHandle, SignalingSession, ViewerConfig,
};
use tokio::sync::mpsc;

/// Control channel that records what the session sends
#[derive(Default)]
pub struct FakeChannel {
    pub sent: Mutex<Vec<ControlMessage>>,
    pub fail_sends: AtomicBool,
    pub close_count: AtomicUsize,
}

impl FakeChannel {
    /// SDP payloads the session sent, as (session_id, description) pairs
    pub fn sdp_messages(&self) -> Vec<(String, SessionDescription)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|msg| match msg {
                ControlMessage::Peer {
                    session_id,
                    sdp: Some(sdp),
                    ..
                } => Some((session_id.clone(), sdp.clone())),
                _ => None,
            })
            .collect()
    }

    /// ICE payloads the session sent, as (session_id, candidate) pairs
    pub fn ice_messages(&self) -> Vec<(String, IceCandidateDescriptor)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|msg| match msg {
                ControlMessage::Peer {
                    session_id,
                    ice: Some(ice),
                    ..
                } => Some((session_id.clone(), ice.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ControlChannel for FakeChannel {
    async fn send(&self, msg: &ControlMessage) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Signaling("fake channel refused send".to_string()));
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out one [`FakeChannel`] and capturing the event sender
#[derive(Default)]
pub struct FakeControlConnector {
    pub channel: Arc<FakeChannel>,
    pub refuse: AtomicBool,
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

impl FakeControlConnector {
    /// Event sender captured at connect time; panics if never connected
    pub fn events(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events
            .lock()
            .unwrap()
            .clone()
            .expect("session never connected the control channel")
    }

    pub fn is_connected(&self) -> bool {
        self.events.lock().unwrap().is_some()
    }
}

#[async_trait]
impl ControlConnector for FakeControlConnector {
    async fn connect(
        &self,
        _relay_url: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn ControlChannel>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::WebSocket("fake connection refused".to_string()));
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(Arc::clone(&self.channel) as Arc<dyn ControlChannel>)
    }
}

/// Peer link that records negotiation steps
#[derive(Default)]
pub struct FakePeer {
    pub offers: Mutex<Vec<String>>,
    pub candidates: Mutex<Vec<IceCandidateDescriptor>>,
    pub fail_apply: AtomicBool,
    pub fail_candidates: AtomicBool,
    pub close_count: AtomicUsize,
}

#[async_trait]
impl PeerLink for FakePeer {
    async fn apply_offer(&self, sdp: &str) -> Result<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(Error::Sdp("fake peer rejected offer".to_string()));
        }
        self.offers.lock().unwrap().push(sdp.to_string());
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        Ok("v=0\r\no=- 42 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n".to_string())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidateDescriptor) -> Result<()> {
        if self.fail_candidates.load(Ordering::SeqCst) {
            return Err(Error::IceCandidate("fake peer rejected candidate".to_string()));
        }
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out one [`FakePeer`]
#[derive(Default)]
pub struct FakePeerConnector {
    pub peer: Arc<FakePeer>,
    pub connect_count: AtomicUsize,
}

#[async_trait]
impl PeerConnector for FakePeerConnector {
    async fn connect(
        &self,
        _config: &ViewerConfig,
        _events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn PeerLink>> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.peer) as Arc<dyn PeerLink>)
    }
}

/// Sink recording every attachment
#[derive(Default)]
pub struct RecordingSink {
    pub attached: Mutex<Vec<MediaKind>>,
}

impl RecordingSink {
    pub fn attached_count(&self) -> usize {
        self.attached.lock().unwrap().len()
    }
}

impl MediaSink for RecordingSink {
    fn attach(&self, media: RemoteMedia) {
        self.attached.lock().unwrap().push(media.kind);
    }
}

/// Counts callback deliveries
#[derive(Default)]
pub struct CallbackLog {
    pub connected: AtomicUsize,
    pub disconnected: AtomicUsize,
    pub errors: Mutex<Vec<String>>,
}

impl CallbackLog {
    pub fn callbacks(self: &Arc<Self>) -> SessionCallbacks {
        let connected = Arc::clone(self);
        let disconnected = Arc::clone(self);
        let errors = Arc::clone(self);

        SessionCallbacks::new()
            .with_on_connected(move || {
                connected.connected.fetch_add(1, Ordering::SeqCst);
            })
            .with_on_disconnected(move || {
                disconnected.disconnected.fetch_add(1, Ordering::SeqCst);
            })
            .with_on_error(move |err| {
                errors.errors.lock().unwrap().push(err.to_string());
            })
    }

    pub fn connected_count(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn disconnected_count(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

/// Poll until `predicate` holds, up to a generous deadline
pub async fn wait_until(predicate: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    predicate()
}

/// Let any already-queued events drain through the session loop
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// A session opened against fresh fakes
pub struct TestSession {
    pub handle: SessionHandle,
    pub control: Arc<FakeControlConnector>,
    pub channel: Arc<FakeChannel>,
    pub peers: Arc<FakePeerConnector>,
    pub peer: Arc<FakePeer>,
    pub sink: Arc<RecordingSink>,
    pub log: Arc<CallbackLog>,
}

pub const PRODUCER_ID: &str = "producer-1";
pub const SESSION_ID: &str = "S1";

impl TestSession {
    /// Open a session with default fakes and wait for registration
    pub async fn open() -> Self {
        let session = Self::open_without_waiting();
        assert!(
            wait_until(|| session.channel.sent_count() >= 2).await,
            "session never registered with the relay"
        );
        session
    }

    /// Open a session with default fakes; no waiting
    pub fn open_without_waiting() -> Self {
        let control = Arc::new(FakeControlConnector::default());
        let peers = Arc::new(FakePeerConnector::default());
        let sink = Arc::new(RecordingSink::default());
        let log = Arc::new(CallbackLog::default());

        let handle = SignalingSession::open_with(
            Arc::clone(&sink) as Arc<dyn MediaSink>,
            ViewerConfig::default(),
            PRODUCER_ID,
            log.callbacks(),
            Arc::clone(&control) as Arc<dyn ControlConnector>,
            Arc::clone(&peers) as Arc<dyn PeerConnector>,
        );

        Self {
            handle,
            channel: Arc::clone(&control.channel),
            peer: Arc::clone(&peers.peer),
            control,
            peers,
            sink,
            log,
        }
    }

    /// Inject an event as if it came from the relay or the peer capability
    pub fn inject(&self, event: SessionEvent) {
        self.control
            .events()
            .send(event)
            .expect("session event queue is gone");
    }

    /// Drive the session to the granted/negotiating stage
    pub async fn grant(&self) {
        self.inject(SessionEvent::Control(ControlMessage::SessionStarted {
            session_id: SESSION_ID.to_string(),
        }));
        assert!(
            wait_until(|| self.peers.connect_count.load(Ordering::SeqCst) == 1).await,
            "session never created a peer connection"
        );
    }
}
