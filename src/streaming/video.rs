//! Camera feed session
//!
//! Probes the camera, hands out a cache-busted feed URL for the selected
//! quality, and tracks the connection status shown to the user.

use super::channel::{Generation, SessionError, SessionResult};
use super::state::{VideoQuality, VideoState, VideoStatus};
use crate::backend::ApiClient;
use crate::config::TimingConfig;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Known IP-camera endpoints, probed in this order
pub const PROBE_ENDPOINTS: [&str; 4] = ["/videofeed", "/video", "/shot.jpg", "/status.json"];

/// Result of a camera reachability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    pub reachable: bool,
    /// First endpoint that answered 2xx
    pub endpoint: Option<String>,
}

struct VideoInner {
    client: Arc<dyn ApiClient>,
    camera_url: String,
    timings: TimingConfig,
    state: RwLock<VideoState>,
    generation: Generation,
    last_stamp: AtomicU64,
}

/// Video session for one camera. Cloning shares the session.
#[derive(Clone)]
pub struct VideoSession {
    inner: Arc<VideoInner>,
}

impl VideoSession {
    /// Create a session for a camera base URL
    pub fn new(client: Arc<dyn ApiClient>, camera_url: &str, timings: TimingConfig) -> Self {
        Self {
            inner: Arc::new(VideoInner {
                client,
                camera_url: camera_url.trim_end_matches('/').to_string(),
                timings,
                state: RwLock::new(VideoState::default()),
                generation: Generation::default(),
                last_stamp: AtomicU64::new(0),
            }),
        }
    }

    /// Camera base URL
    pub fn camera_url(&self) -> &str {
        &self.inner.camera_url
    }

    /// Current state snapshot
    pub fn state(&self) -> VideoState {
        self.inner.state.read().clone()
    }

    fn update<F: FnOnce(&mut VideoState)>(&self, f: F) {
        f(&mut self.inner.state.write());
    }

    fn update_if_current<F: FnOnce(&mut VideoState)>(&self, generation: u64, f: F) {
        let mut state = self.inner.state.write();
        if self.inner.generation.is_current(generation) {
            f(&mut state);
        }
    }

    /// Millisecond stamp, strictly increasing across calls on this session
    fn next_stamp(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .inner
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(previous + 1)
    }

    /// Feed URL for a quality, with a fresh cache-busting parameter
    pub fn resolve_stream_url(&self, quality: VideoQuality) -> String {
        format!("{}{}", self.inner.camera_url, quality.feed_path(self.next_stamp()))
    }

    /// Probe the camera endpoints in order; the first 2xx wins
    pub async fn test_connectivity(&self) -> ConnectivityReport {
        let generation = self.inner.generation.current();
        self.probe(generation).await
    }

    async fn probe(&self, generation: u64) -> ConnectivityReport {
        self.update_if_current(generation, |s| s.status = VideoStatus::Testing);

        for suffix in PROBE_ENDPOINTS {
            let url = format!("{}{}", self.inner.camera_url, suffix);
            match self.inner.client.head(&url).await {
                Ok(status) if (200..300).contains(&status) => {
                    tracing::debug!("Camera answered {} on {}", status, url);
                    self.update_if_current(generation, |s| s.status = VideoStatus::Connected);
                    return ConnectivityReport {
                        reachable: true,
                        endpoint: Some(url),
                    };
                }
                Ok(status) => tracing::debug!("Probe {} returned {}", url, status),
                Err(e) => tracing::debug!("Probe {} failed: {}", url, e),
            }
        }

        self.update_if_current(generation, |s| s.status = VideoStatus::Failed);
        ConnectivityReport {
            reachable: false,
            endpoint: None,
        }
    }

    /// Probe the camera and, if reachable, start streaming
    pub async fn start(&self) -> SessionResult<()> {
        let generation = self.inner.generation.advance();
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        tracing::info!("Starting video stream from {}", self.inner.camera_url);

        let report = self.probe(generation).await;
        if !self.inner.generation.is_current(generation) {
            tracing::debug!("Discarding superseded video start");
            return Err(SessionError::Superseded);
        }

        if !report.reachable {
            let message = format!("No se pudo conectar a {}", self.inner.camera_url);
            tracing::warn!("{}", message);
            self.update_if_current(generation, |s| {
                s.error = Some(message.clone());
                s.status = VideoStatus::Failed;
                s.loading = false;
            });
            return Err(SessionError::Unreachable(message));
        }

        tokio::time::sleep(self.inner.timings.stream_settle()).await;

        {
            let mut state = self.inner.state.write();
            if !self.inner.generation.is_current(generation) {
                tracing::debug!("Discarding superseded video start");
                return Err(SessionError::Superseded);
            }
            state.stream_url = self.resolve_stream_url(state.quality);
            state.streaming = true;
            state.status = VideoStatus::Streaming;
            state.loading = false;
        }

        tracing::info!("Video streaming at {}", self.state().stream_url);
        Ok(())
    }

    /// Stop streaming. Safe to call in any state.
    pub fn stop(&self) {
        self.inner.generation.advance();
        self.update(|s| {
            s.streaming = false;
            s.loading = false;
            s.stream_url.clear();
            s.status = VideoStatus::Disconnected;
        });
        tracing::debug!("Video stream stopped");
    }

    /// Select a quality; re-resolves the feed URL immediately when streaming
    pub fn change_quality(&self, quality: VideoQuality) {
        let mut state = self.inner.state.write();
        state.quality = quality;
        if state.streaming {
            state.stream_url = self.resolve_stream_url(quality);
        }
        tracing::debug!("Video quality set to {}", quality);
    }

    /// Re-resolve the feed URL so renderers reload it. `None` when not streaming.
    pub fn refresh(&self) -> Option<String> {
        let mut state = self.inner.state.write();
        if !state.streaming {
            return None;
        }
        state.stream_url = self.resolve_stream_url(state.quality);
        Some(state.stream_url.clone())
    }

    /// Stop, wait the reconnect delay, start again
    pub async fn reconnect(&self) -> SessionResult<()> {
        tracing::info!("Reconnecting video stream");
        self.stop();
        tokio::time::sleep(self.inner.timings.video_reconnect_delay()).await;
        self.start().await
    }

    /// Clear the recorded error
    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    /// Refresh the feed URL on the keep-alive interval while the task runs
    pub fn spawn_keepalive(&self) -> JoinHandle<()> {
        let session = self.clone();
        let period = self.inner.timings.keepalive_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Some(url) = session.refresh() {
                    tracing::trace!("Keep-alive refresh: {}", url);
                }
            }
        })
    }

    /// Start when the active flag turns on, stop when it turns off.
    ///
    /// The task ends when the flag's sender is dropped.
    pub fn follow(&self, mut active: watch::Receiver<bool>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                let wanted = *active.borrow_and_update();
                let state = session.state();

                if wanted && !state.streaming && !state.loading {
                    if let Err(e) = session.start().await {
                        tracing::warn!("Automatic video start failed: {}", e);
                    }
                } else if !wanted && (state.streaming || state.loading) {
                    session.stop();
                }

                if active.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
