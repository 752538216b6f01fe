//! Control channel to the signaling relay
//!
//! The session talks to the relay through the [`ControlChannel`] trait; the
//! WebSocket implementation splits the stream into a sender task fed by an
//! mpsc queue and a receiver task that decodes frames into
//! [`ControlMessage`]s and forwards them to the session's event queue.

use crate::session::SessionEvent;
use crate::signaling::protocol::ControlMessage;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Message-oriented control channel to the signaling relay
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Send a control message to the relay
    async fn send(&self, msg: &ControlMessage) -> Result<()>;

    /// Release the channel, suppressing any errors raised during release
    async fn close(&self);
}

/// Factory for control channels; the injection seam for fakes
#[async_trait]
pub trait ControlConnector: Send + Sync {
    /// Open a channel to `relay_url` and wire inbound traffic to `events`
    async fn connect(
        &self,
        relay_url: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn ControlChannel>>;
}

/// Connector producing [`WebSocketControlChannel`]s
#[derive(Debug, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl ControlConnector for WebSocketConnector {
    async fn connect(
        &self,
        relay_url: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn ControlChannel>> {
        let channel = WebSocketControlChannel::connect(relay_url, events).await?;
        Ok(Arc::new(channel))
    }
}

/// Control channel over a WebSocket connection
pub struct WebSocketControlChannel {
    /// Outgoing frame queue consumed by the sender task
    tx: mpsc::UnboundedSender<Message>,
}

impl WebSocketControlChannel {
    /// Connect to the relay and start the sender/receiver tasks
    pub async fn connect(
        relay_url: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        info!("Connecting to signaling relay: {}", relay_url);

        let (ws_stream, _) = connect_async(relay_url)
            .await
            .map_err(|e| Error::WebSocket(format!("Failed to connect: {}", e)))?;

        info!("Connected to signaling relay");

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, events));

        Ok(Self { tx })
    }

    /// Sender task: forwards queued frames to the WebSocket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
            if is_close {
                break;
            }
        }

        debug!("Sender task terminated");
    }

    /// Receiver task: decodes frames and forwards them as session events
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match ControlMessage::from_json(&text) {
                    Ok(msg) => {
                        let _ = events.send(SessionEvent::Control(msg));
                    }
                    Err(e) => warn!("Ignoring unparseable relay message: {}", e),
                },
                Ok(Message::Close(_)) => {
                    info!("Control channel closed by relay");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = events.send(SessionEvent::ChannelError(Error::WebSocket(
                        e.to_string(),
                    )));
                    break;
                }
            }
        }

        let _ = events.send(SessionEvent::ChannelClosed);
        debug!("Receiver task terminated");
    }
}

#[async_trait]
impl ControlChannel for WebSocketControlChannel {
    async fn send(&self, msg: &ControlMessage) -> Result<()> {
        let json = msg.to_json()?;
        debug!("Sending control message: {}", json);

        self.tx
            .send(Message::Text(json))
            .map_err(|e| Error::Signaling(format!("Failed to send message: {}", e)))?;

        Ok(())
    }

    async fn close(&self) {
        // The channel may already be gone; nothing to report either way.
        let _ = self.tx.send(Message::Close(None));
    }
}
