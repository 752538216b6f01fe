//! Viewer binary entry point
//!
//! Opens a viewer session toward a named producer and logs what happens
//! until interrupted. Useful for checking a relay/producer pair without a
//! rendering frontend.
//!
//! # Usage
//!
//! ```bash
//! # Watch a producer through a local relay
//! cargo run --bin stream_viewer -- \
//!   --relay-url ws://localhost:8443 \
//!   --producer-id robot-cam-01
//!
//! # Configure STUN/TURN servers
//! cargo run --bin stream_viewer -- \
//!   --producer-id robot-cam-01 \
//!   --stun-servers stun:stun.l.google.com:19302
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use stream_viewer::{
    LogSink, SessionCallbacks, SignalingSession, TurnServerConfig, ViewerConfig,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Stream Viewer
///
/// Connects to a signaling relay, negotiates a media session with a named
/// producer peer, and logs remote track arrivals.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket signaling relay URL
    #[arg(long, default_value = "ws://localhost:8443", env = "VIEWER_RELAY_URL")]
    relay_url: String,

    /// Identity of the producer peer to watch
    #[arg(long, env = "VIEWER_PRODUCER_ID")]
    producer_id: String,

    /// Display name announced to the relay
    #[arg(long, default_value = "stream-viewer", env = "VIEWER_DISPLAY_NAME")]
    display_name: String,

    /// STUN servers (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302"
    )]
    stun_servers: Vec<String>,

    /// TURN servers (format: turn:host:port:username:password, comma-separated)
    #[arg(long, value_delimiter = ',', env = "VIEWER_TURN_SERVERS")]
    turn_servers: Vec<String>,

    /// Relay dial timeout in seconds (no timeout when omitted)
    #[arg(long, env = "VIEWER_CONNECT_TIMEOUT")]
    connect_timeout_secs: Option<u64>,

    /// Optional TOML config file; command-line flags win over it
    #[arg(long, env = "VIEWER_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(ViewerConfig, String)> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };

        config.relay_url = self.relay_url;
        config.display_name = self.display_name;
        config.stun_servers = self.stun_servers;
        config.turn_servers = self
            .turn_servers
            .iter()
            .filter_map(|spec| match parse_turn_server(spec) {
                Some(turn) => Some(turn),
                None => {
                    warn!("Ignoring malformed TURN server spec: {}", spec);
                    None
                }
            })
            .collect();
        if self.connect_timeout_secs.is_some() {
            config.connect_timeout_secs = self.connect_timeout_secs;
        }

        config.validate()?;
        Ok((config, self.producer_id))
    }
}

/// Parse `turn:host:port:username:password` into a TURN server config
fn parse_turn_server(spec: &str) -> Option<TurnServerConfig> {
    let rest = spec
        .strip_prefix("turn:")
        .or_else(|| spec.strip_prefix("turns:"))?;
    let scheme = if spec.starts_with("turns:") {
        "turns"
    } else {
        "turn"
    };

    let parts: Vec<&str> = rest.split(':').collect();
    if parts.len() != 4 {
        return None;
    }

    Some(TurnServerConfig {
        url: format!("{}:{}:{}", scheme, parts[0], parts[1]),
        username: parts[2].to_string(),
        credential: parts[3].to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let (config, producer_id) = args.into_config()?;

    info!(
        relay = %config.relay_url,
        producer = %producer_id,
        "starting stream viewer"
    );

    let callbacks = SessionCallbacks::new()
        .with_on_connected(|| info!("connected, media flowing"))
        .with_on_disconnected(|| warn!("disconnected from producer"))
        .with_on_error(|err| error!("session error: {}", err));

    let handle = SignalingSession::open(Arc::new(LogSink), config, producer_id, callbacks);

    tokio::signal::ctrl_c().await?;
    info!("interrupted, closing session");
    handle.close();

    Ok(())
}
