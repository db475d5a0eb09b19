//! Configuration handling for the relay binary.
//!
//! Settings come from an optional YAML file, then `RELAY_*` environment
//! variables, then command-line flags (applied in `main`).

use anyhow::{Context, Result};
use relay_session::{DEFAULT_FETCH_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_RETRIES};
use relay_wire::DEFAULT_FRAGMENT_SIZE;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Well-known relay port
pub const DEFAULT_PORT: u16 = 11111;

/// Relay configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayConfig {
    /// Server side settings
    pub server: ServerSettings,
    /// Client side settings
    pub client: ClientSettings,
}

/// Settings for `relay serve`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Address the server binds
    pub listen: String,
    /// Maximum payload bytes per frame
    pub max_fragment_size: usize,
    /// Resend cycles before a session gives up
    pub max_retries: u32,
    /// Time allowed for one fetch
    pub fetch_timeout: Duration,
}

/// Settings for `relay get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Relay server address
    pub server: String,
    /// Silence allowed between two datagrams
    pub idle_timeout: Duration,
    /// ACK timeout requested from the server
    pub ack_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_fragment_size: DEFAULT_FRAGMENT_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server: format!("localhost:{}", DEFAULT_PORT),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            ack_timeout: Duration::from_secs(5),
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Default, Deserialize)]
struct RootConfig {
    server: Option<ServerSection>,
    client: Option<ClientSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    listen: Option<String>,
    max_fragment_size: Option<usize>,
    max_retries: Option<u32>,
    fetch_timeout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClientSection {
    server: Option<String>,
    idle_timeout: Option<String>,
    ack_timeout: Option<String>,
}

impl RelayConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        info!(
            "Relay configuration: listen={} max_fragment_size={} max_retries={} server={}",
            config.server.listen,
            config.server.max_fragment_size,
            config.server.max_retries,
            config.client.server
        );

        Ok(config)
    }

    /// Load configuration from a YAML file
    ///
    /// A missing or unparsable file falls back to defaults. A file that parses
    /// but carries a bad duration is an error.
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    config.apply_root_config(root)?;
                    info!("Loaded configuration from {:?}", path);
                }
                Err(e) => warn!("Failed to parse config file {:?}, using defaults: {}", path, e),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", path),
        }

        Ok(config)
    }

    fn apply_root_config(&mut self, root: RootConfig) -> Result<()> {
        if let Some(server) = root.server {
            if let Some(listen) = server.listen {
                self.server.listen = listen;
            }
            if let Some(size) = server.max_fragment_size {
                self.server.max_fragment_size = size;
            }
            if let Some(retries) = server.max_retries {
                self.server.max_retries = retries;
            }
            if let Some(timeout) = server.fetch_timeout {
                self.server.fetch_timeout =
                    parse_duration(&timeout).context("server.fetch_timeout")?;
            }
        }

        if let Some(client) = root.client {
            if let Some(server) = client.server {
                self.client.server = server;
            }
            if let Some(timeout) = client.idle_timeout {
                self.client.idle_timeout =
                    parse_duration(&timeout).context("client.idle_timeout")?;
            }
            if let Some(timeout) = client.ack_timeout {
                self.client.ack_timeout = parse_duration(&timeout).context("client.ack_timeout")?;
            }
        }

        Ok(())
    }

    /// Apply `RELAY_*` overrides read through `lookup`
    ///
    /// Values that fail to parse are ignored with a warning.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = lookup("RELAY_LISTEN") {
            info!("Listen address overridden by environment: {}", listen);
            self.server.listen = listen;
        }

        if let Some(value) = lookup("RELAY_MAX_FRAGMENT_SIZE") {
            match value.parse::<usize>() {
                Ok(size) => self.server.max_fragment_size = size,
                Err(_) => warn!("Ignoring RELAY_MAX_FRAGMENT_SIZE={}", value),
            }
        }

        if let Some(value) = lookup("RELAY_MAX_RETRIES") {
            match value.parse::<u32>() {
                Ok(retries) => self.server.max_retries = retries,
                Err(_) => warn!("Ignoring RELAY_MAX_RETRIES={}", value),
            }
        }

        if let Some(value) = lookup("RELAY_FETCH_TIMEOUT") {
            match parse_duration(&value) {
                Ok(timeout) => self.server.fetch_timeout = timeout,
                Err(_) => warn!("Ignoring RELAY_FETCH_TIMEOUT={}", value),
            }
        }

        if let Some(server) = lookup("RELAY_SERVER") {
            info!("Server address overridden by environment: {}", server);
            self.client.server = server;
        }

        if let Some(value) = lookup("RELAY_IDLE_TIMEOUT") {
            match parse_duration(&value) {
                Ok(timeout) => self.client.idle_timeout = timeout,
                Err(_) => warn!("Ignoring RELAY_IDLE_TIMEOUT={}", value),
            }
        }

        if let Some(value) = lookup("RELAY_ACK_TIMEOUT") {
            match parse_duration(&value) {
                Ok(timeout) => self.client.ack_timeout = timeout,
                Err(_) => warn!("Ignoring RELAY_ACK_TIMEOUT={}", value),
            }
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .with_context(|| format!("invalid duration {:?}", value))
}
