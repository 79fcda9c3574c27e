//! Client configuration
//!
//! Backend addresses and lifecycle timings. Values come from built-in
//! defaults, an optional JSON file, and `KUNTUR_*` environment overrides,
//! applied in that order.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Which push-channel transport the live event subscriber uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// `text/event-stream` long-lived response
    EventStream,
    /// Socket.IO over WebSocket, tied to a capture-start call
    DuplexSocket,
}

impl Default for TransportKind {
    fn default() -> Self {
        Self::EventStream
    }
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "event-stream" | "sse" => Ok(Self::EventStream),
            "duplex-socket" | "socket" | "websocket" => Ok(Self::DuplexSocket),
            _ => Err(ConfigError::InvalidValue {
                key: "transport",
                value: value.to_string(),
            }),
        }
    }
}

/// Lifecycle timings, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    /// Timeout for backend requests
    pub request_timeout_ms: u64,
    /// Timeout for each camera HEAD probe
    pub probe_timeout_ms: u64,
    /// Pause between resolving the feed URL and reporting streaming
    pub stream_settle_ms: u64,
    /// Delay between stop and start on a video reconnect
    pub video_reconnect_delay_ms: u64,
    /// Delay before a live event subscriber reconnects
    pub event_reconnect_delay_ms: u64,
    /// Audio level meter tick
    pub level_tick_ms: u64,
    /// Feed URL refresh interval for MJPEG renderers
    pub keepalive_interval_ms: u64,
    /// Simulated latency of the initial status fetch
    pub status_fetch_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            probe_timeout_ms: 3_000,
            stream_settle_ms: 500,
            video_reconnect_delay_ms: 1_000,
            event_reconnect_delay_ms: 1_000,
            level_tick_ms: 200,
            keepalive_interval_ms: 30_000,
            status_fetch_delay_ms: 500,
        }
    }
}

impl TimingConfig {
    /// Timings with every delay set to zero, for tests and scripted runs
    pub fn immediate() -> Self {
        Self {
            stream_settle_ms: 0,
            video_reconnect_delay_ms: 0,
            event_reconnect_delay_ms: 0,
            level_tick_ms: 10,
            status_fetch_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn stream_settle(&self) -> Duration {
        Duration::from_millis(self.stream_settle_ms)
    }

    pub fn video_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.video_reconnect_delay_ms)
    }

    pub fn event_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.event_reconnect_delay_ms)
    }

    pub fn level_tick(&self) -> Duration {
        Duration::from_millis(self.level_tick_ms.max(1))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.max(1))
    }

    pub fn status_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.status_fetch_delay_ms)
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KunturConfig {
    /// Registration backend (`/api/register`, `/check-user`)
    pub api_base_url: String,
    /// Manual alert backend (`/alerta_manual`)
    pub alert_base_url: String,
    /// Audio capture service (`/audio/start-capture`, `/audio/stop-capture`)
    pub audio_service_url: String,
    /// Video detection service (`/start_detection`, `/stop_detection`)
    pub video_service_url: String,
    /// Server-push event stream
    pub event_stream_url: String,
    /// Socket.IO endpoint for the duplex transport
    pub socket_url: String,
    /// Live event transport
    pub transport: TransportKind,
    /// Directory holding the registered profile blob
    pub data_dir: PathBuf,
    pub timings: TimingConfig,
}

impl Default for KunturConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://192.168.100.29:5000".to_string(),
            alert_base_url: "http://192.168.1.34:5000".to_string(),
            audio_service_url: "http://192.168.100.29:5001".to_string(),
            video_service_url: "http://192.168.100.29:5002".to_string(),
            event_stream_url: "http://192.168.1.34:5000/stream".to_string(),
            socket_url: "http://192.168.100.29:5000".to_string(),
            transport: TransportKind::default(),
            data_dir: PathBuf::from(".kuntur"),
            timings: TimingConfig::default(),
        }
    }
}

impl KunturConfig {
    /// Load configuration from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(path)?;
                let config: KunturConfig = serde_json::from_str(&content)?;
                tracing::debug!("Loaded config from {:?}", path);
                config
            }
            Some(path) => {
                tracing::warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `KUNTUR_*` overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let urls: [(&str, &mut String); 6] = [
            ("KUNTUR_API_URL", &mut self.api_base_url),
            ("KUNTUR_ALERT_URL", &mut self.alert_base_url),
            ("KUNTUR_AUDIO_URL", &mut self.audio_service_url),
            ("KUNTUR_VIDEO_URL", &mut self.video_service_url),
            ("KUNTUR_EVENTS_URL", &mut self.event_stream_url),
            ("KUNTUR_SOCKET_URL", &mut self.socket_url),
        ];
        for (key, slot) in urls {
            if let Some(value) = lookup(key) {
                *slot = trim_base(&value);
            }
        }

        if let Some(value) = lookup("KUNTUR_TRANSPORT") {
            self.transport = value.parse()?;
        }
        if let Some(value) = lookup("KUNTUR_DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }

        Ok(())
    }
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn trim_base(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
