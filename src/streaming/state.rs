//! Session state snapshots
//!
//! Plain data describing each session at a point in time. Sessions hand out
//! clones of these; they are never shared mutably outside the session.

use serde::{Deserialize, Serialize};

/// Feed variant requested from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoQuality {
    Hd,
    Sd,
    Low,
    /// Raw `/video` stream
    Stream,
    /// Single JPEG frame
    Snapshot,
}

impl Default for VideoQuality {
    fn default() -> Self {
        Self::Hd
    }
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 5] = [
        VideoQuality::Hd,
        VideoQuality::Sd,
        VideoQuality::Low,
        VideoQuality::Stream,
        VideoQuality::Snapshot,
    ];

    /// Parse a quality name; unknown names fall back to HD
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "SD" => Self::Sd,
            "LOW" => Self::Low,
            "STREAM" => Self::Stream,
            "SNAPSHOT" => Self::Snapshot,
            _ => Self::Hd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hd => "HD",
            Self::Sd => "SD",
            Self::Low => "LOW",
            Self::Stream => "STREAM",
            Self::Snapshot => "SNAPSHOT",
        }
    }

    /// Path and cache-busting query for this quality
    pub fn feed_path(&self, stamp: u64) -> String {
        match self {
            Self::Hd | Self::Sd | Self::Low => format!("/videofeed?{}", stamp),
            Self::Stream => format!("/video?{}", stamp),
            Self::Snapshot => format!("/shot.jpg?rnd={}", stamp),
        }
    }
}

impl std::fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Disconnected,
    /// Probing camera endpoints
    Testing,
    /// A probe answered
    Connected,
    /// Feed URL handed to the renderer
    Streaming,
    Failed,
}

impl Default for VideoStatus {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Video session snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoState {
    pub streaming: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub quality: VideoQuality,
    /// Empty unless streaming
    pub stream_url: String,
    pub status: VideoStatus,
}

/// Audio session snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioState {
    pub streaming: bool,
    pub loading: bool,
    pub error: Option<String>,
    /// Synthetic meter level in [0, 100)
    pub level: f32,
}

/// Detection pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchStatus {
    On,
    Off,
    /// A transition failed and at least one channel could not be brought back
    Degraded,
}

impl Default for SwitchStatus {
    fn default() -> Self {
        Self::Off
    }
}

/// Master switch snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchState {
    pub status: SwitchStatus,
    pub loading: bool,
    pub error: Option<String>,
}
