//! Configuration for viewer sessions

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a viewer session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// WebSocket signaling relay URL (ws:// or wss://)
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Display name announced to the relay in the registration message
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// STUN server URLs (at least one required)
    #[serde(default = "default_stun_servers")]
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    #[serde(default)]
    pub turn_servers: Vec<TurnServerConfig>,

    /// Optional timeout for the initial relay dial, in seconds.
    ///
    /// `None` disables the timeout entirely: a relay that never answers
    /// leaves the session connecting until the caller closes it.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

fn default_relay_url() -> String {
    "ws://localhost:8443".to_string()
}

fn default_display_name() -> String {
    "stream-viewer".to_string()
}

fn default_stun_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_string()]
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            display_name: default_display_name(),
            stun_servers: default_stun_servers(),
            turn_servers: Vec::new(),
            connect_timeout_secs: None,
        }
    }
}

impl ViewerConfig {
    /// Create a configuration for the given relay URL with default settings
    pub fn new(relay_url: &str) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    ///
    /// Missing fields fall back to their defaults, so a minimal file only
    /// needs to name the relay URL.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ViewerConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `relay_url` is not a valid WebSocket URL
    /// - `stun_servers` is empty or contains a non-STUN URL
    /// - a TURN server URL does not use a TURN scheme
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.relay_url.starts_with("ws://") && !self.relay_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "relay_url must start with ws:// or wss://, got {}",
                self.relay_url
            )));
        }

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        for url in &self.stun_servers {
            if !url.starts_with("stun:") && !url.starts_with("stuns:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN server URL must start with stun: or stuns:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN server URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        Ok(())
    }

    /// Set the display name announced to the relay
    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    /// Replace the STUN server list
    pub fn with_stun_servers(mut self, stun_servers: Vec<String>) -> Self {
        self.stun_servers = stun_servers;
        self
    }

    /// Add TURN servers to this configuration
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }

    /// Set the relay dial timeout in seconds
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.connect_timeout_secs.is_none());
    }

    #[test]
    fn test_invalid_relay_url_fails() {
        let config = ViewerConfig::new("http://localhost:8443");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_stun_servers_fails() {
        let mut config = ViewerConfig::default();
        config.stun_servers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_stun_scheme_fails() {
        let config =
            ViewerConfig::default().with_stun_servers(vec!["http://example.com".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_turn_scheme_fails() {
        let config = ViewerConfig::default().with_turn_servers(vec![TurnServerConfig {
            url: "stun:turn.example.com:3478".to_string(),
            username: "user".to_string(),
            credential: "pass".to_string(),
        }]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let config = ViewerConfig::new("wss://relay.example.com:8443")
            .with_display_name("kiosk-3")
            .with_connect_timeout_secs(10);
        assert!(config.validate().is_ok());
        assert_eq!(config.display_name, "kiosk-3");
        assert_eq!(config.connect_timeout_secs, Some(10));
    }

    #[test]
    fn test_minimal_toml_parses_with_defaults() {
        let config: ViewerConfig =
            toml::from_str(r#"relay_url = "wss://relay.example.com:8443""#).unwrap();
        assert_eq!(config.relay_url, "wss://relay.example.com:8443");
        assert_eq!(config.stun_servers, default_stun_servers());
        assert!(config.turn_servers.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = ViewerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ViewerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.relay_url, deserialized.relay_url);
    }
}
