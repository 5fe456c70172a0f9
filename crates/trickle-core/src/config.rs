//! Configuration system for BitTrickle.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TRICKLE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/bittrickle/config.toml
//!   3. ~/.config/bittrickle/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::{HEARTBEAT_INTERVAL_MS, LIVENESS_TIMEOUT_MS, REAP_INTERVAL_MS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrickleConfig {
    pub server: ServerConfig,
    pub peer: PeerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the control socket binds to.
    pub bind_addr: String,
    /// UDP control port. 0 = OS-assigned.
    pub port: u16,
    /// `username password` file read once at startup.
    pub credentials_path: PathBuf,
    /// Sessions silent for longer than this are evicted.
    pub liveness_timeout_ms: u64,
    /// How often the reaper scans the registry.
    pub reap_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Control address of the coordination server.
    pub server_addr: String,
    pub heartbeat_interval_ms: u64,
    /// Address the transfer listener binds to. The port is always ephemeral.
    pub transfer_bind_addr: String,
    /// Per-attempt reply timeout. 0 = wait forever.
    pub request_timeout_ms: u64,
    /// Extra attempts after a timeout. Ignored when there is no timeout.
    pub request_retries: u32,
    /// Directory served files are read from and downloads are written to.
    pub share_dir: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            credentials_path: PathBuf::from("credentials.txt"),
            liveness_timeout_ms: LIVENESS_TIMEOUT_MS,
            reap_interval_ms: REAP_INTERVAL_MS,
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            transfer_bind_addr: "127.0.0.1".to_string(),
            request_timeout_ms: 0,
            request_retries: 0,
            share_dir: PathBuf::from("."),
        }
    }
}

impl ServerConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms.max(1))
    }
}

impl PeerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("bittrickle")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TrickleConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            TrickleConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TRICKLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&TrickleConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TRICKLE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TRICKLE_SERVER__BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(p) = env_parse("TRICKLE_SERVER__PORT") {
            self.server.port = p;
        }
        if let Ok(v) = std::env::var("TRICKLE_SERVER__CREDENTIALS_PATH") {
            self.server.credentials_path = PathBuf::from(v);
        }
        if let Some(ms) = env_parse("TRICKLE_SERVER__LIVENESS_TIMEOUT_MS") {
            self.server.liveness_timeout_ms = ms;
        }
        if let Some(ms) = env_parse("TRICKLE_SERVER__REAP_INTERVAL_MS") {
            self.server.reap_interval_ms = ms;
        }
        if let Ok(v) = std::env::var("TRICKLE_PEER__SERVER_ADDR") {
            self.peer.server_addr = v;
        }
        if let Some(ms) = env_parse("TRICKLE_PEER__HEARTBEAT_INTERVAL_MS") {
            self.peer.heartbeat_interval_ms = ms;
        }
        if let Ok(v) = std::env::var("TRICKLE_PEER__TRANSFER_BIND_ADDR") {
            self.peer.transfer_bind_addr = v;
        }
        if let Some(ms) = env_parse("TRICKLE_PEER__REQUEST_TIMEOUT_MS") {
            self.peer.request_timeout_ms = ms;
        }
        if let Some(n) = env_parse("TRICKLE_PEER__REQUEST_RETRIES") {
            self.peer.request_retries = n;
        }
        if let Ok(v) = std::env::var("TRICKLE_PEER__SHARE_DIR") {
            self.peer.share_dir = PathBuf::from(v);
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
