//! Runtime configuration.
//!
//! Every field has a default matching the helper's historical constants, so
//! an empty file (or no file) is a valid configuration. Files are TOML:
//!
//! ```toml
//! shutdown_timeout_ms = 2000
//!
//! [capture]
//! interface = "en0"
//! filter = "udp port 9000"
//!
//! [translate]
//! payload_mode = "hex-string"
//! source_address = "192.168.0.101"
//!
//! [output]
//! port_name = "Magical MIDI Source"
//! ```

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::AddressFilter;
use crate::translate::PayloadMode;

pub const DEFAULT_INTERFACE: &str = "en0";
pub const DEFAULT_FILTER: &str = "udp port 9000";
/// Room for a full 1024-byte event list plus link, IP and UDP headers.
pub const DEFAULT_SNAPLEN: i32 = 8192;
pub const DEFAULT_READ_TIMEOUT_MS: i32 = 2;
pub const DEFAULT_CLIENT_NAME: &str = "Magical MIDI";
pub const DEFAULT_PORT_NAME: &str = "Magical MIDI Source";
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub capture: CaptureConfig,
    pub translate: TranslateConfig,
    pub output: OutputConfig,
    pub channel: ChannelConfig,
    /// Bounded wait for the capture thread at teardown.
    pub shutdown_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            translate: TranslateConfig::default(),
            output: OutputConfig::default(),
            channel: ChannelConfig::default(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub interface: String,
    pub filter: String,
    pub snaplen: i32,
    pub promiscuous: bool,
    pub timeout_ms: i32,
    /// Replay this capture file instead of opening `interface`.
    pub replay: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            filter: DEFAULT_FILTER.to_string(),
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            replay: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslateConfig {
    pub payload_mode: PayloadMode,
    /// Only frames from this IPv4 source are translated.
    pub source_address: Option<Ipv4Addr>,
}

impl TranslateConfig {
    pub fn address_filter(&self) -> AddressFilter {
        match self.source_address {
            Some(addr) => AddressFilter::ExactMatch(addr),
            None => AddressFilter::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub client_name: String,
    pub port_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            port_name: DEFAULT_PORT_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Longest a single forwarded message may block on a slow parent.
    pub send_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.replay.is_none() && self.capture.interface.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "capture.interface",
                message: "must not be empty".to_string(),
            });
        }
        if self.capture.snaplen <= 0 {
            return Err(ConfigError::Invalid {
                field: "capture.snaplen",
                message: format!("must be positive, got {}", self.capture.snaplen),
            });
        }
        if self.capture.timeout_ms <= 0 {
            return Err(ConfigError::Invalid {
                field: "capture.timeout_ms",
                message: format!("must be positive, got {}", self.capture.timeout_ms),
            });
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        match self.channel.send_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
