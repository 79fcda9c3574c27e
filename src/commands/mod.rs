//! Command handlers
//!
//! The operations a front end invokes: registration and profile, the camera
//! feed, the master switch, live events and the manual alert. Every handler
//! takes the shared [`AppState`] and reports failures as [`ErrorResponse`].

pub mod alert;
pub mod events;
pub mod profile;
pub mod session;

use crate::backend::{ApiClient, HttpApiClient};
use crate::config::KunturConfig;
use crate::events::LiveEventSubscriber;
use crate::profile::{PremisesProfile, ProfileStore};
use crate::streaming::{AudioSession, DetectionChannel, MasterSwitch, SwitchStatus, VideoSession};
use crate::utils::error::{AppError, AppResult, ErrorResponse};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Result type returned by command handlers
pub type CommandResult<T> = Result<T, ErrorResponse>;

pub(crate) fn to_response<E: Into<AppError>>(error: E) -> ErrorResponse {
    ErrorResponse::from(error.into())
}

/// Sessions bound to the registered premises
pub struct Pipeline {
    pub profile: PremisesProfile,
    pub video: VideoSession,
    pub audio: AudioSession,
    pub switch: Arc<MasterSwitch>,
    follower: JoinHandle<()>,
}

impl Pipeline {
    /// Wire the sessions for a profile. The video session follows the
    /// switch's active flag for as long as the pipeline lives.
    pub fn new(config: &KunturConfig, client: Arc<dyn ApiClient>, profile: PremisesProfile) -> Self {
        let timings = config.timings.clone();

        let video = VideoSession::new(client.clone(), profile.camera_base(), timings.clone());
        let audio = AudioSession::new(client.clone(), &config.audio_service_url, &profile, timings.clone());
        let detection = DetectionChannel::new(client, &config.video_service_url, &profile);

        let mut switch = MasterSwitch::new(timings);
        switch.add_channel(Arc::new(detection));
        switch.add_channel(Arc::new(audio.clone()));
        let switch = Arc::new(switch);

        let follower = video.follow(switch.active());

        tracing::info!("Pipeline ready for '{}'", profile.nombre_local);

        Self {
            profile,
            video,
            audio,
            switch,
            follower,
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.follower.abort();
    }
}

/// Shared state behind every command
pub struct AppState {
    pub config: KunturConfig,
    pub client: Arc<dyn ApiClient>,
    pub store: ProfileStore,
    pipeline: Mutex<Option<Arc<Pipeline>>>,
    subscriber: Mutex<Option<LiveEventSubscriber>>,
}

impl AppState {
    /// State backed by a real HTTP client
    pub fn new(config: KunturConfig) -> AppResult<Self> {
        let client = HttpApiClient::new(
            config.timings.request_timeout(),
            config.timings.probe_timeout(),
        )?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// State over any [`ApiClient`]
    pub fn with_client(config: KunturConfig, client: Arc<dyn ApiClient>) -> Self {
        let store = ProfileStore::new(&config.data_dir);
        Self {
            config,
            client,
            store,
            pipeline: Mutex::new(None),
            subscriber: Mutex::new(None),
        }
    }

    /// Sessions for the registered premises, built on first use
    pub async fn pipeline(&self) -> AppResult<Arc<Pipeline>> {
        let mut slot = self.pipeline.lock().await;
        if let Some(pipeline) = slot.as_ref() {
            return Ok(pipeline.clone());
        }

        let profile = self.store.load()?.ok_or(AppError::NotRegistered)?;
        let pipeline = Arc::new(Pipeline::new(&self.config, self.client.clone(), profile));
        *slot = Some(pipeline.clone());
        Ok(pipeline)
    }

    /// Drop the sessions so the next use picks up a changed profile.
    ///
    /// A pipeline whose switch is not `off` is deactivated first.
    pub async fn reset_pipeline(&self) {
        let Some(pipeline) = self.pipeline.lock().await.take() else {
            return;
        };

        if pipeline.switch.status() != SwitchStatus::Off {
            tracing::info!("Deactivating '{}' before reset", pipeline.profile.nombre_local);
            if let Err(e) = pipeline.switch.deactivate().await {
                tracing::warn!("Deactivation before reset failed: {}", e);
            }
        }
        tracing::debug!("Pipeline reset");
    }

    /// Live event subscriber, built on first use
    pub async fn subscriber(&self) -> AppResult<LiveEventSubscriber> {
        let mut slot = self.subscriber.lock().await;
        if let Some(subscriber) = slot.as_ref() {
            return Ok(subscriber.clone());
        }

        let profile = self.store.load()?;
        let subscriber =
            crate::events::build_subscriber(&self.config, self.client.clone(), profile.as_ref())?;
        *slot = Some(subscriber.clone());
        Ok(subscriber)
    }

    /// Close and forget the subscriber so the next use is built for the
    /// current profile
    pub async fn reset_subscriber(&self) {
        let Some(subscriber) = self.subscriber.lock().await.take() else {
            return;
        };
        subscriber.close().await;
        tracing::debug!("Subscriber reset");
    }

    /// Rebuild everything bound to the profile
    pub async fn reset_sessions(&self) {
        self.reset_pipeline().await;
        self.reset_subscriber().await;
    }
}
