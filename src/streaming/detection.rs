//! Remote video detection channel

use super::channel::{post_command, Generation, PipelineChannel, SessionError, SessionResult};
use crate::backend::{ApiClient, CapturePayload};
use crate::config::join_url;
use crate::profile::PremisesProfile;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
struct DetectionState {
    active: bool,
    error: Option<String>,
}

/// Starts and stops the backend's video detection for one premises
pub struct DetectionChannel {
    id: String,
    client: Arc<dyn ApiClient>,
    start_url: String,
    stop_url: String,
    payload: CapturePayload,
    state: RwLock<DetectionState>,
    generation: Generation,
}

impl DetectionChannel {
    pub fn new(
        client: Arc<dyn ApiClient>,
        video_service_url: &str,
        profile: &PremisesProfile,
    ) -> Self {
        Self {
            id: "video-detection".to_string(),
            client,
            start_url: join_url(video_service_url, "/start_detection"),
            stop_url: join_url(video_service_url, "/stop_detection"),
            payload: CapturePayload::detection(profile),
            state: RwLock::new(DetectionState::default()),
            generation: Generation::default(),
        }
    }

    /// Last recorded error
    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    async fn send(&self, url: &str, prefix: &str, activate: bool) -> SessionResult<()> {
        let generation = self.generation.advance();
        let result = post_command(self.client.as_ref(), url, &self.payload, prefix).await;

        let mut state = self.state.write();
        if !self.generation.is_current(generation) {
            return Err(SessionError::Superseded);
        }
        match result {
            Ok(()) => {
                state.active = activate;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{}", err);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[async_trait]
impl PipelineChannel for DetectionChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&self) -> SessionResult<()> {
        tracing::info!("Starting video detection at {}", self.start_url);
        self.send(&self.start_url, "Error al iniciar video", true).await
    }

    async fn stop(&self) -> SessionResult<()> {
        tracing::info!("Stopping video detection");
        self.send(&self.stop_url, "Error al detener video", false).await
    }

    fn is_active(&self) -> bool {
        self.state.read().active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::ScriptedClient;

    #[tokio::test]
    async fn test_detection_payload_and_state() {
        let client = Arc::new(
            ScriptedClient::new()
                .reply("/start_detection", 200, "{}")
                .reply("/stop_detection", 500, "no model"),
        );
        let channel = DetectionChannel::new(
            client.clone(),
            "http://video:5002/",
            &PremisesProfile::sample("http://10.0.0.5:8080"),
        );

        channel.start().await.unwrap();
        assert!(channel.is_active());
        let body = client.calls()[0].body.clone().unwrap();
        assert_eq!(body["ip_camara"], "http://10.0.0.5:8080/video_feed");
        assert_eq!(client.calls()[0].url, "http://video:5002/start_detection");

        let err = channel.stop().await.unwrap_err();
        assert_eq!(err.to_string(), "Error al detener video: no model");
        assert!(channel.is_active());
        assert_eq!(channel.error().as_deref(), Some("Error al detener video: no model"));
    }
}
