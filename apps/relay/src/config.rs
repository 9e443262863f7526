//! Relay configuration.
//!
//! Configuration is stored as TOML at `$SYNCANVAS_CONFIG` when set, else:
//! - Linux: `~/.config/syncanvas/relay.toml`
//! - Windows: `%APPDATA%/syncanvas/relay.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use syncanvas_relay_server::{SEND_BUFFER_SIZE, ServerConfig};

/// Environment variable overriding the config file location.
const CONFIG_ENV: &str = "SYNCANVAS_CONFIG";

/// Relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// WebSocket server port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Strokes kept per room before the oldest are evicted.
    #[serde(default = "default_max_strokes")]
    pub max_strokes_per_room: usize,

    /// Outbound frames queued per connection.
    #[serde(default = "default_send_buffer_size")]
    pub send_buffer_size: usize,

    /// WebSocket keepalive ping period in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

fn default_max_strokes() -> usize {
    10_000
}

fn default_send_buffer_size() -> usize {
    SEND_BUFFER_SIZE
}

fn default_ping_interval() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_strokes_per_room: default_max_strokes(),
            send_buffer_size: default_send_buffer_size(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Builds the server-side configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            max_strokes_per_room: self.max_strokes_per_room,
            send_buffer_size: self.send_buffer_size.max(1),
            ping_interval: Duration::from_secs(self.ping_interval_secs.max(1)),
        }
    }
}

/// Returns the configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("syncanvas")
            .join("relay.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("syncanvas").join("relay.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/syncanvas/relay.toml"))
    }
}
