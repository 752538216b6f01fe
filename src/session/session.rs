//! The signaling session state machine
//!
//! `open()` begins connecting immediately and never fails synchronously;
//! every failure is reported through the caller's `on_error` callback. The
//! session never retries or reconnects on its own: a failed session is
//! terminal and the caller restarts it by closing the handle and opening a
//! new one.

use crate::config::ViewerConfig;
use crate::peer::{PeerConnector, PeerEvent, PeerLink, PeerLinkState, WebRtcConnector};
use crate::session::{SessionEvent, SessionState};
use crate::signaling::{
    ControlChannel, ControlConnector, ControlMessage, IceCandidateDescriptor, PeerMeta, PeerRole,
    SessionDescription, WebSocketConnector,
};
use crate::sink::MediaSink;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

type ConnectedCallback = Arc<dyn Fn() + Send + Sync>;
type DisconnectedCallback = Arc<dyn Fn() + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(Error) + Send + Sync>;

/// Callback set delivered to `open`
///
/// Every callback is optional; missing ones are skipped.
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    on_connected: Option<ConnectedCallback>,
    on_disconnected: Option<DisconnectedCallback>,
    on_error: Option<ErrorCallback>,
}

impl SessionCallbacks {
    /// Create an empty callback set
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked once when the first remote media track is bound to the sink
    pub fn with_on_connected<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_connected = Some(Arc::new(callback));
        self
    }

    /// Invoked when the control channel or the peer connection is lost
    pub fn with_on_disconnected<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_disconnected = Some(Arc::new(callback));
        self
    }

    /// Invoked on every reportable failure, exactly once per occurrence
    pub fn with_on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

/// Callback delivery guard
///
/// The closed flag is checked at delivery time, so nothing reaches the
/// caller once `close()` has returned, including disconnect events raised
/// by the teardown itself.
struct Notifier {
    closed: Arc<AtomicBool>,
    connected_fired: AtomicBool,
    callbacks: SessionCallbacks,
}

impl Notifier {
    fn connected(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.connected_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(callback) = &self.callbacks.on_connected {
            callback();
        }
    }

    fn disconnected(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(callback) = &self.callbacks.on_disconnected {
            callback();
        }
    }

    fn error(&self, err: Error) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        warn!(%err, "session error");
        if let Some(callback) = &self.callbacks.on_error {
            callback(err);
        }
    }
}

/// State shared between the handle and the driver task
struct SessionShared {
    closed: Arc<AtomicBool>,
    close_signal: Notify,
    state: RwLock<SessionState>,
    session_id: RwLock<Option<String>>,
    channel: Mutex<Option<Arc<dyn ControlChannel>>>,
    peer: Mutex<Option<Arc<dyn PeerLink>>>,
}

impl SessionShared {
    fn set_state(&self, new_state: SessionState) {
        let mut state = self.state.write().unwrap();
        if *state != new_state {
            debug!("session state transition: {:?} -> {:?}", *state, new_state);
            *state = new_state;
        }
    }
}

/// Viewer-side signaling session negotiator
///
/// Establishes a live media connection to a single named producer peer over
/// a signaling relay, using a trickle-ICE offer/answer exchange. One
/// instance owns one control channel and at most one peer connection; there
/// is no shared state across sessions.
pub struct SignalingSession;

impl SignalingSession {
    /// Open a session toward `producer_id` through the configured relay.
    ///
    /// Connecting begins immediately; there is no separate start step. The
    /// call never fails synchronously; failures surface asynchronously
    /// through `callbacks.on_error`. Must be called within a tokio runtime.
    pub fn open(
        sink: Arc<dyn MediaSink>,
        config: ViewerConfig,
        producer_id: impl Into<String>,
        callbacks: SessionCallbacks,
    ) -> SessionHandle {
        Self::open_with(
            sink,
            config,
            producer_id,
            callbacks,
            Arc::new(WebSocketConnector),
            Arc::new(WebRtcConnector),
        )
    }

    /// Open a session with injected control-channel and peer capabilities.
    ///
    /// This is the seam that lets the state machine run against fakes; the
    /// plain `open` wires in the WebSocket and WebRTC implementations.
    pub fn open_with(
        sink: Arc<dyn MediaSink>,
        config: ViewerConfig,
        producer_id: impl Into<String>,
        callbacks: SessionCallbacks,
        control: Arc<dyn ControlConnector>,
        peers: Arc<dyn PeerConnector>,
    ) -> SessionHandle {
        let producer_id = producer_id.into();
        let instance = uuid::Uuid::new_v4();
        info!(%instance, producer = %producer_id, "opening viewer session");

        let closed = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(SessionShared {
            closed: Arc::clone(&closed),
            close_signal: Notify::new(),
            state: RwLock::new(SessionState::Connecting),
            session_id: RwLock::new(None),
            channel: Mutex::new(None),
            peer: Mutex::new(None),
        });

        let notifier = Arc::new(Notifier {
            closed,
            connected_fired: AtomicBool::new(false),
            callbacks,
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = SessionDriver {
            shared: Arc::clone(&shared),
            notifier,
            sink,
            config,
            producer_id,
            control,
            peers,
            events_tx,
            channel_open: false,
            answered: false,
        };

        tokio::spawn(driver.run(events_rx));

        SessionHandle { shared }
    }
}

/// Handle to a running session
///
/// `close()` is the only cancellation primitive and the only guaranteed
/// release path; callers must invoke it after `on_error`/`on_disconnected`
/// if they intend to free resources.
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Tear the session down: idempotent, callable from any state.
    ///
    /// Sets the permanent closed flag before anything is released, so no
    /// callback is delivered after the first `close()` returns. The driver
    /// then releases the peer connection and the control channel, in that
    /// order, swallowing release errors.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.set_state(SessionState::Closed);
        self.shared.close_signal.notify_one();
        info!("session closed");
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.shared.state.read().unwrap()
    }

    /// Session token assigned by the relay, once granted
    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id.read().unwrap().clone()
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Owns the event loop; every transition runs on this task
struct SessionDriver {
    shared: Arc<SessionShared>,
    notifier: Arc<Notifier>,
    sink: Arc<dyn MediaSink>,
    config: ViewerConfig,
    producer_id: String,
    control: Arc<dyn ControlConnector>,
    peers: Arc<dyn PeerConnector>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,

    /// Local candidates are only relayed while this is true
    channel_open: bool,

    /// Set once the first offer has been answered; no renegotiation
    answered: bool,
}

impl SessionDriver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        if let Err(err) = self.connect_and_register().await {
            self.notifier.error(err);
        }

        let shared = Arc::clone(&self.shared);
        while !shared.closed.load(Ordering::SeqCst) {
            tokio::select! {
                _ = shared.close_signal.notified() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }

        self.release().await;
        debug!("session event loop terminated");
    }

    /// Open the control channel and fire the two unconditional messages:
    /// viewer registration, then the session request. The relay's grant is
    /// the only acknowledgment consumed.
    async fn connect_and_register(&mut self) -> Result<()> {
        let connect = self
            .control
            .connect(&self.config.relay_url, self.events_tx.clone());

        let channel = match self.config.connect_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), connect)
                .await
                .map_err(|_| {
                    Error::WebSocket(format!("relay dial timed out after {}s", secs))
                })??,
            None => connect.await?,
        };

        *self.shared.channel.lock().unwrap() = Some(Arc::clone(&channel));
        if self.shared.closed.load(Ordering::SeqCst) {
            // close() raced the dial; the loop exits immediately and the
            // release path picks the channel back up.
            return Ok(());
        }
        self.channel_open = true;

        channel
            .send(&ControlMessage::SetPeerStatus {
                roles: vec![PeerRole::Listener],
                meta: PeerMeta {
                    name: self.config.display_name.clone(),
                },
            })
            .await?;
        channel
            .send(&ControlMessage::StartSession {
                peer_id: self.producer_id.clone(),
            })
            .await?;

        self.shared.set_state(SessionState::AwaitingGrant);
        info!(producer = %self.producer_id, "registered, session requested");
        Ok(())
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        // close() may race an already-queued event; nothing is handled once
        // the flag is set.
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        match event {
            SessionEvent::Control(msg) => self.handle_control(msg).await,
            SessionEvent::ChannelError(err) => self.notifier.error(err),
            SessionEvent::ChannelClosed => {
                self.channel_open = false;
                info!("control channel closed");
                self.notifier.disconnected();
            }
            SessionEvent::Peer(event) => self.handle_peer(event).await,
        }
    }

    async fn handle_control(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::SessionStarted { session_id } => self.handle_grant(session_id).await,
            ControlMessage::Peer {
                session_id,
                sdp,
                ice,
            } => self.handle_payload(session_id, sdp, ice).await,
            ControlMessage::Error { details } => self.notifier.error(Error::Relay(details)),
            other => debug!("ignoring unexpected relay message: {:?}", other),
        }
    }

    /// Transition 2: record the session token, create the peer connection,
    /// enter `Negotiating`.
    async fn handle_grant(&mut self, session_id: String) {
        if self.shared.session_id.read().unwrap().is_some() {
            // Re-grant while a session is active is undefined relay
            // behavior; keep the session we have.
            warn!(%session_id, "ignoring session grant while one is active");
            return;
        }
        *self.shared.session_id.write().unwrap() = Some(session_id.clone());

        let peer = match self
            .peers
            .connect(&self.config, self.events_tx.clone())
            .await
        {
            Ok(peer) => peer,
            Err(err) => {
                self.notifier.error(err);
                return;
            }
        };

        *self.shared.peer.lock().unwrap() = Some(peer);
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }

        self.shared.set_state(SessionState::Negotiating);
        info!(session = %session_id, "session granted");
    }

    /// Payloads referencing anything but the active session are stray
    /// relay traffic and are silently discarded.
    async fn handle_payload(
        &mut self,
        session_id: String,
        sdp: Option<SessionDescription>,
        ice: Option<IceCandidateDescriptor>,
    ) {
        let active = { self.shared.session_id.read().unwrap().clone() };
        if active.as_deref() != Some(session_id.as_str()) {
            debug!(%session_id, "discarding payload for inactive session");
            return;
        }

        if let Some(description) = sdp {
            self.handle_offer(&session_id, description).await;
        }
        if let Some(candidate) = ice {
            self.handle_remote_candidate(candidate).await;
        }
    }

    /// Transition 6: the offer/answer chain. On any failure the error is
    /// reported once and no answer is sent; the session stalls in
    /// `Negotiating` until the caller closes it.
    async fn handle_offer(&mut self, session_id: &str, description: SessionDescription) {
        if self.answered {
            warn!("ignoring SDP payload after negotiation completed");
            return;
        }

        let peer = { self.shared.peer.lock().unwrap().clone() };
        let peer = match peer {
            Some(peer) => peer,
            None => {
                warn!("SDP payload received before the peer connection exists");
                return;
            }
        };

        let answer = match Self::negotiate_answer(&peer, &description).await {
            Ok(answer) => answer,
            Err(err) => {
                self.notifier.error(err);
                return;
            }
        };
        self.answered = true;

        let reply = ControlMessage::Peer {
            session_id: session_id.to_string(),
            sdp: Some(SessionDescription::answer(answer)),
            ice: None,
        };
        match self.send_control(&reply).await {
            Ok(()) => debug!("answer sent"),
            Err(err) => self.notifier.error(err),
        }
    }

    async fn negotiate_answer(
        peer: &Arc<dyn PeerLink>,
        description: &SessionDescription,
    ) -> Result<String> {
        peer.apply_offer(&description.sdp).await?;
        peer.create_answer().await
    }

    /// Transition 7: trickled candidates can race session teardown, so a
    /// late or duplicate candidate must not abort the session.
    async fn handle_remote_candidate(&self, candidate: IceCandidateDescriptor) {
        let peer = { self.shared.peer.lock().unwrap().clone() };
        let peer = match peer {
            Some(peer) => peer,
            None => {
                debug!("candidate received before the peer connection exists");
                return;
            }
        };

        if let Err(err) = peer.add_remote_candidate(candidate).await {
            debug!("failed to add remote candidate: {}", err);
        }
    }

    async fn handle_peer(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Track(media) => {
                info!(kind = %media.kind, "remote media track");
                self.sink.attach(media);
                self.shared.set_state(SessionState::Connected);
                // At most once per session; further tracks still bind to
                // the sink but do not re-signal the caller.
                self.notifier.connected();
            }
            PeerEvent::LocalCandidate(candidate) => self.handle_local_candidate(candidate).await,
            PeerEvent::StateChange(state) => {
                debug!(?state, "peer connection state");
                if matches!(state, PeerLinkState::Failed | PeerLinkState::Disconnected) {
                    // The caller decides whether to tear down and retry.
                    self.notifier.disconnected();
                }
            }
        }
    }

    /// Transition 4: wrap every discovered local candidate in a payload
    /// tagged with the active session and relay it.
    async fn handle_local_candidate(&self, candidate: IceCandidateDescriptor) {
        if !self.channel_open {
            debug!("dropping local candidate, control channel is closed");
            return;
        }
        let session_id = { self.shared.session_id.read().unwrap().clone() };
        let session_id = match session_id {
            Some(session_id) => session_id,
            None => {
                debug!("dropping local candidate, no active session");
                return;
            }
        };

        let msg = ControlMessage::Peer {
            session_id,
            sdp: None,
            ice: Some(candidate),
        };
        if let Err(err) = self.send_control(&msg).await {
            self.notifier.error(err);
        }
    }

    async fn send_control(&self, msg: &ControlMessage) -> Result<()> {
        let channel = { self.shared.channel.lock().unwrap().clone() };
        let channel = channel
            .ok_or_else(|| Error::Signaling("control channel not connected".to_string()))?;
        channel.send(msg).await
    }

    /// Release the peer connection, then the control channel. The order
    /// matters only for avoiding duplicate close events: the closed flag is
    /// already set, so a disconnect triggered by the channel release can
    /// never reach the caller.
    async fn release(&self) {
        let peer = { self.shared.peer.lock().unwrap().take() };
        if let Some(peer) = peer {
            peer.close().await;
        }

        let channel = { self.shared.channel.lock().unwrap().take() };
        if let Some(channel) = channel {
            channel.close().await;
        }
    }
}
