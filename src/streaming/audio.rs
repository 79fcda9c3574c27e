//! Remote audio capture session
//!
//! Starts and stops the backend's capture of the camera microphone and runs
//! a synthetic level meter while capture is active.

use super::channel::{post_command, Generation, PipelineChannel, SessionError, SessionResult};
use super::state::AudioState;
use crate::backend::{ApiClient, CapturePayload};
use crate::config::{join_url, TimingConfig};
use crate::profile::PremisesProfile;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

struct AudioInner {
    id: String,
    client: Arc<dyn ApiClient>,
    start_url: String,
    stop_url: String,
    payload: CapturePayload,
    timings: TimingConfig,
    state: RwLock<AudioState>,
    generation: Generation,
    meter: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for AudioInner {
    fn drop(&mut self) {
        if let Some(handle) = self.meter.get_mut().take() {
            handle.abort();
        }
    }
}

/// Audio capture session. Cloning shares the session.
#[derive(Clone)]
pub struct AudioSession {
    inner: Arc<AudioInner>,
}

impl AudioSession {
    /// Create a session against the audio service for a registered premises
    pub fn new(
        client: Arc<dyn ApiClient>,
        audio_service_url: &str,
        profile: &PremisesProfile,
        timings: TimingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AudioInner {
                id: "audio".to_string(),
                client,
                start_url: join_url(audio_service_url, "/audio/start-capture"),
                stop_url: join_url(audio_service_url, "/audio/stop-capture"),
                payload: CapturePayload::audio(profile),
                timings,
                state: RwLock::new(AudioState::default()),
                generation: Generation::default(),
                meter: Mutex::new(None),
            }),
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> AudioState {
        self.inner.state.read().clone()
    }

    /// Payload sent with start/stop
    pub fn payload(&self) -> &CapturePayload {
        &self.inner.payload
    }

    fn update<F: FnOnce(&mut AudioState)>(&self, f: F) {
        f(&mut self.inner.state.write());
    }

    /// Ask the capture service to start; on success the level meter runs
    pub async fn start(&self) -> SessionResult<()> {
        let generation = self.inner.generation.advance();
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        tracing::info!("Starting audio capture for '{}'", self.inner.payload.nombre_local);

        let result = post_command(
            self.inner.client.as_ref(),
            &self.inner.start_url,
            &self.inner.payload,
            "Error al activar audio",
        )
        .await;

        if !self.inner.generation.is_current(generation) {
            tracing::debug!("Discarding superseded audio start");
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(()) => {
                self.update(|s| {
                    s.streaming = true;
                    s.loading = false;
                });
                self.start_meter();
                tracing::info!("Audio capture active");
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{}", err);
                self.update(|s| {
                    s.error = Some(err.to_string());
                    s.loading = false;
                });
                Err(err)
            }
        }
    }

    /// Ask the capture service to stop. A rejected stop leaves `streaming` as it was.
    pub async fn stop(&self) -> SessionResult<()> {
        let generation = self.inner.generation.advance();
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = post_command(
            self.inner.client.as_ref(),
            &self.inner.stop_url,
            &self.inner.payload,
            "Error al detener audio",
        )
        .await;

        if !self.inner.generation.is_current(generation) {
            tracing::debug!("Discarding superseded audio stop");
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(()) => {
                self.stop_meter();
                self.update(|s| {
                    s.streaming = false;
                    s.loading = false;
                    s.level = 0.0;
                });
                tracing::info!("Audio capture stopped");
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{}", err);
                self.update(|s| {
                    s.error = Some(err.to_string());
                    s.loading = false;
                });
                Err(err)
            }
        }
    }

    /// Clear the recorded error
    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    fn start_meter(&self) {
        let weak: Weak<AudioInner> = Arc::downgrade(&self.inner);
        let period = self.inner.timings.level_tick();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let level: f32 = rand::thread_rng().gen_range(0.0..100.0);
                let mut state = inner.state.write();
                if !state.streaming {
                    break;
                }
                state.level = level;
            }
        });

        if let Some(previous) = self.inner.meter.lock().replace(handle) {
            previous.abort();
        }
    }

    fn stop_meter(&self) {
        if let Some(handle) = self.inner.meter.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl PipelineChannel for AudioSession {
    fn id(&self) -> &str {
        &self.inner.id
    }

    async fn start(&self) -> SessionResult<()> {
        AudioSession::start(self).await
    }

    async fn stop(&self) -> SessionResult<()> {
        AudioSession::stop(self).await
    }

    fn is_active(&self) -> bool {
        self.inner.state.read().streaming
    }
}
