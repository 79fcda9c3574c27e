//! Master switch
//!
//! Turns the whole detection pipeline on and off. Channels are started in
//! insertion order and stopped in the same order; a failed activation stops
//! whatever already started, in reverse.

use super::channel::{PipelineChannel, SessionError, SessionResult};
use super::state::{SwitchState, SwitchStatus};
use crate::config::TimingConfig;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Events emitted by the switch
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchEvent {
    /// Every channel started
    Activated,
    /// Every channel stopped
    Deactivated,
    /// A transition left at least one channel in an unknown state
    Degraded(String),
    /// A transition failed and was fully rolled back
    Error(String),
}

struct TransitionGuard<'a>(&'a AtomicBool);

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Manages the pipeline channels as one unit
pub struct MasterSwitch {
    /// Current switch state
    state: Arc<RwLock<SwitchState>>,

    /// Pipeline channels, in start order
    channels: Vec<Arc<dyn PipelineChannel>>,

    /// Pipeline-wide active flag, followed by the video session
    active_tx: watch::Sender<bool>,

    /// Set while a transition is in flight
    transitioning: AtomicBool,

    /// Event broadcaster
    event_tx: broadcast::Sender<SwitchEvent>,

    timings: TimingConfig,
}

impl MasterSwitch {
    /// Create a switch with no channels
    pub fn new(timings: TimingConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (active_tx, _) = watch::channel(false);
        Self {
            state: Arc::new(RwLock::new(SwitchState::default())),
            channels: Vec::new(),
            active_tx,
            transitioning: AtomicBool::new(false),
            event_tx,
            timings,
        }
    }

    /// Add a channel; channels start in the order they were added
    pub fn add_channel(&mut self, channel: Arc<dyn PipelineChannel>) {
        tracing::info!("Adding channel: {}", channel.id());
        self.channels.push(channel);
    }

    /// Remove all channels
    pub fn clear_channels(&mut self) {
        self.channels.clear();
    }

    /// Current state snapshot
    pub fn state(&self) -> SwitchState {
        self.state.read().clone()
    }

    pub fn status(&self) -> SwitchStatus {
        self.state.read().status
    }

    /// Subscribe to switch events
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.event_tx.subscribe()
    }

    /// Observe the pipeline-wide active flag
    pub fn active(&self) -> watch::Receiver<bool> {
        self.active_tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        *self.active_tx.borrow()
    }

    fn begin_transition(&self) -> SessionResult<TransitionGuard<'_>> {
        if self
            .transitioning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Rejected switch transition: another one is in flight");
            return Err(SessionError::Busy);
        }

        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }
        Ok(TransitionGuard(&self.transitioning))
    }

    fn finish(&self, status: SwitchStatus, error: Option<String>) {
        let mut state = self.state.write();
        state.status = status;
        state.loading = false;
        state.error = error;
    }

    fn emit(&self, event: SwitchEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Resolve the initial status. The backend has no status query yet, so
    /// this always settles on `off`.
    pub async fn fetch_status(&self) -> SessionResult<SwitchStatus> {
        let _guard = self.begin_transition()?;

        tokio::time::sleep(self.timings.status_fetch_delay()).await;

        self.active_tx.send_replace(false);
        self.finish(SwitchStatus::Off, None);
        Ok(SwitchStatus::Off)
    }

    /// Start every channel in order
    pub async fn activate(&self) -> SessionResult<()> {
        let _guard = self.begin_transition()?;

        tracing::info!("Activating Kuntur ({} channels)", self.channels.len());
        self.active_tx.send_replace(true);

        let mut started: Vec<&Arc<dyn PipelineChannel>> = Vec::new();
        for channel in &self.channels {
            match channel.start().await {
                Ok(()) => started.push(channel),
                Err(err) => {
                    tracing::warn!("Channel {} failed to start: {}", channel.id(), err);

                    let rolled_back = Self::compensate(&started).await;
                    self.active_tx.send_replace(false);

                    let message = format!("Error al activar Kuntur: {}", err);
                    if rolled_back {
                        self.finish(SwitchStatus::Off, Some(message.clone()));
                        self.emit(SwitchEvent::Error(message.clone()));
                    } else {
                        self.finish(SwitchStatus::Degraded, Some(message.clone()));
                        self.emit(SwitchEvent::Degraded(message.clone()));
                    }
                    return Err(SessionError::Switch(message));
                }
            }
        }

        self.finish(SwitchStatus::On, None);
        self.emit(SwitchEvent::Activated);
        tracing::info!("Kuntur active");
        Ok(())
    }

    /// Stop channels that already started, newest first
    async fn compensate(started: &[&Arc<dyn PipelineChannel>]) -> bool {
        let mut clean = true;
        for channel in started.iter().rev() {
            tracing::info!("Rolling back channel {}", channel.id());
            if let Err(err) = channel.stop().await {
                tracing::error!("Rollback of {} failed: {}", channel.id(), err);
                clean = false;
            }
        }
        clean
    }

    /// Stop every channel in order. Every channel is asked to stop even if an
    /// earlier one failed.
    pub async fn deactivate(&self) -> SessionResult<()> {
        let _guard = self.begin_transition()?;

        tracing::info!("Deactivating Kuntur");
        self.active_tx.send_replace(false);

        let mut failures = Vec::new();
        for channel in &self.channels {
            if let Err(err) = channel.stop().await {
                tracing::warn!("Channel {} failed to stop: {}", channel.id(), err);
                failures.push(err.to_string());
            }
        }

        if failures.is_empty() {
            self.finish(SwitchStatus::Off, None);
            self.emit(SwitchEvent::Deactivated);
            tracing::info!("Kuntur inactive");
            Ok(())
        } else {
            let message = format!("Error al desactivar Kuntur: {}", failures.join("; "));
            self.finish(SwitchStatus::Degraded, Some(message.clone()));
            self.emit(SwitchEvent::Degraded(message.clone()));
            Err(SessionError::Switch(message))
        }
    }

    /// Activate when off, deactivate otherwise
    pub async fn toggle(&self) -> SessionResult<()> {
        match self.status() {
            SwitchStatus::Off => self.activate().await,
            SwitchStatus::On | SwitchStatus::Degraded => self.deactivate().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::ScriptedClient;
    use crate::profile::PremisesProfile;
    use crate::streaming::{AudioSession, DetectionChannel};
    use std::time::Duration;

    fn switch_with(client: ScriptedClient) -> (MasterSwitch, Arc<ScriptedClient>, AudioSession) {
        let client = Arc::new(client);
        let profile = PremisesProfile::sample("http://10.0.0.5:8080");
        let timings = TimingConfig::immediate();

        let detection = DetectionChannel::new(client.clone(), "http://video:5002", &profile);
        let audio = AudioSession::new(client.clone(), "http://audio:5001", &profile, timings.clone());

        let mut switch = MasterSwitch::new(timings);
        switch.add_channel(Arc::new(detection));
        switch.add_channel(Arc::new(audio.clone()));
        (switch, client, audio)
    }

    fn all_ok() -> ScriptedClient {
        ScriptedClient::new()
            .reply("/start_detection", 200, "{}")
            .reply("/stop_detection", 200, "{}")
            .reply("/audio/start-capture", 200, "{}")
            .reply("/audio/stop-capture", 200, "{}")
    }

    fn paths(client: &ScriptedClient) -> Vec<String> {
        client
            .urls()
            .into_iter()
            .map(|u| u.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_status_settles_off() {
        let (switch, _, _) = switch_with(all_ok());
        assert_eq!(switch.fetch_status().await.unwrap(), SwitchStatus::Off);
        assert!(!switch.is_active());
        assert!(!switch.state().loading);
    }

    #[tokio::test]
    async fn test_activate_then_deactivate() {
        let (switch, client, audio) = switch_with(all_ok());
        let mut events = switch.subscribe();

        switch.activate().await.unwrap();
        assert_eq!(switch.status(), SwitchStatus::On);
        assert!(switch.is_active());
        assert!(audio.state().streaming);

        switch.deactivate().await.unwrap();
        assert_eq!(switch.status(), SwitchStatus::Off);
        assert!(!switch.is_active());
        assert!(!audio.state().streaming);

        assert_eq!(
            paths(&client),
            vec!["start_detection", "start-capture", "stop_detection", "stop-capture"]
        );
        assert_eq!(events.recv().await.unwrap(), SwitchEvent::Activated);
        assert_eq!(events.recv().await.unwrap(), SwitchEvent::Deactivated);
    }

    #[tokio::test]
    async fn test_partial_activation_is_rolled_back() {
        let (switch, client, audio) = switch_with(
            ScriptedClient::new()
                .reply("/start_detection", 200, "{}")
                .reply("/stop_detection", 200, "{}")
                .reply("/audio/start-capture", 500, "device busy"),
        );

        let err = switch.activate().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error al activar Kuntur: Error al activar audio: device busy"
        );
        let state = switch.state();
        assert_eq!(state.status, SwitchStatus::Off);
        assert_eq!(state.error.as_deref(), Some(err.to_string().as_str()));
        assert!(!state.loading);
        assert!(!switch.is_active());
        assert!(!audio.state().streaming);
        assert_eq!(
            paths(&client),
            vec!["start_detection", "start-capture", "stop_detection"]
        );
    }

    #[tokio::test]
    async fn test_failed_rollback_degrades() {
        let (switch, _, _) = switch_with(
            ScriptedClient::new()
                .reply("/start_detection", 200, "{}")
                .reply("/stop_detection", 500, "stuck")
                .reply("/audio/start-capture", 500, "device busy"),
        );

        assert!(switch.activate().await.is_err());
        assert_eq!(switch.status(), SwitchStatus::Degraded);
        assert!(!switch.is_active());
    }

    #[tokio::test]
    async fn test_deactivate_stops_every_channel() {
        let (switch, client, _) = switch_with(
            ScriptedClient::new()
                .reply("/start_detection", 200, "{}")
                .reply("/stop_detection", 500, "stuck")
                .reply("/audio/start-capture", 200, "{}")
                .reply("/audio/stop-capture", 200, "{}"),
        );
        switch.activate().await.unwrap();

        let err = switch.deactivate().await.unwrap_err();

        assert!(err.to_string().starts_with("Error al desactivar Kuntur"));
        assert_eq!(switch.status(), SwitchStatus::Degraded);
        assert!(paths(&client).ends_with(&["stop_detection".to_string(), "stop-capture".to_string()]));

        // Degraded toggles towards off
        let _ = switch.toggle().await;
        assert_eq!(paths(&client).last().map(String::as_str), Some("stop-capture"));
    }

    #[tokio::test]
    async fn test_toggle_dispatches_on_status() {
        let (switch, _, _) = switch_with(all_ok());
        switch.toggle().await.unwrap();
        assert_eq!(switch.status(), SwitchStatus::On);
        switch.toggle().await.unwrap();
        assert_eq!(switch.status(), SwitchStatus::Off);
    }

    #[tokio::test]
    async fn test_concurrent_transition_is_busy() {
        let (switch, _, _) = switch_with(all_ok().with_delay(Duration::from_millis(50)));
        let switch = Arc::new(switch);

        let first = {
            let switch = switch.clone();
            tokio::spawn(async move { switch.activate().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(switch.deactivate().await, Err(SessionError::Busy));
        first.await.unwrap().unwrap();
        assert_eq!(switch.status(), SwitchStatus::On);
    }
}
