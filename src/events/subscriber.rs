//! Live event subscriber
//!
//! Owns one push connection, buffers decoded transcriptions and alerts, and
//! exposes the connection status as a watch channel. Dropped connections are
//! reported, never retried automatically.

use super::parse::{AlertRecord, LiveEvent};
use super::transport::{EventStream, EventTransport};
use crate::backend::{TransportError, TransportResult};
use crate::streaming::Generation;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Connect failure or dropped connection
    Error,
    Reconnecting,
    /// The server refused the stream or the capture start
    Failed,
}

impl Default for SubscriberStatus {
    fn default() -> Self {
        Self::Disconnected
    }
}

struct SubscriberInner {
    transport: Arc<dyn EventTransport>,
    reconnect_delay: Duration,
    status_tx: watch::Sender<SubscriberStatus>,
    transcriptions: RwLock<Vec<String>>,
    alerts: RwLock<Vec<AlertRecord>>,
    last_error: RwLock<Option<String>>,
    event_tx: broadcast::Sender<LiveEvent>,
    generation: Generation,
    pump: Mutex<Option<JoinHandle<()>>>,
    /// Set once transport setup succeeds, cleared by `close`
    opened: AtomicBool,
}

impl SubscriberInner {
    fn set_status(&self, status: SubscriberStatus) {
        self.status_tx.send_replace(status);
    }

    fn record(&self, event: LiveEvent) {
        match &event {
            LiveEvent::Transcription(text) => {
                tracing::debug!("Transcription: {}", text);
                self.transcriptions.write().push(text.clone());
            }
            LiveEvent::Alert(record) => {
                tracing::info!("Alert received: {}", record.payload);
                self.alerts.write().push(record.clone());
            }
        }
        let _ = self.event_tx.send(event);
    }

    fn fail(&self, err: &TransportError) {
        let status = if err.is_rejection() {
            SubscriberStatus::Failed
        } else {
            SubscriberStatus::Error
        };
        *self.last_error.write() = Some(err.to_string());
        self.set_status(status);
    }

    fn abort_pump(&self) {
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for SubscriberInner {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.get_mut().take() {
            handle.abort();
        }

        if !*self.opened.get_mut() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(
                    "Subscriber dropped while open, releasing {} transport",
                    self.transport.name()
                );
                let transport = self.transport.clone();
                runtime.spawn(async move {
                    transport.shutdown().await;
                });
            }
            Err(_) => tracing::warn!("Subscriber dropped outside a runtime; transport not released"),
        }
    }
}

/// Subscriber over one [`EventTransport`]. Cloning shares the subscriber.
#[derive(Clone)]
pub struct LiveEventSubscriber {
    inner: Arc<SubscriberInner>,
}

impl LiveEventSubscriber {
    pub fn new(transport: Arc<dyn EventTransport>, reconnect_delay: Duration) -> Self {
        let (status_tx, _) = watch::channel(SubscriberStatus::Disconnected);
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(SubscriberInner {
                transport,
                reconnect_delay,
                status_tx,
                transcriptions: RwLock::new(Vec::new()),
                alerts: RwLock::new(Vec::new()),
                last_error: RwLock::new(None),
                event_tx,
                generation: Generation::default(),
                pump: Mutex::new(None),
                opened: AtomicBool::new(false),
            }),
        }
    }

    /// Whether both handles share one subscriber
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn status(&self) -> SubscriberStatus {
        *self.inner.status_tx.borrow()
    }

    /// Observe status changes
    pub fn status_watch(&self) -> watch::Receiver<SubscriberStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Live feed of decoded events
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn transcriptions(&self) -> Vec<String> {
        self.inner.transcriptions.read().clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.inner.alerts.read().clone()
    }

    /// Last connection error, if any
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }

    /// Open the channel: transport setup, then connect
    pub async fn open(&self) -> TransportResult<()> {
        let generation = self.inner.generation.advance();
        self.inner.abort_pump();
        *self.inner.last_error.write() = None;
        self.inner.set_status(SubscriberStatus::Connecting);

        tracing::info!("Opening {} subscriber", self.inner.transport.name());

        if let Err(err) = self.inner.transport.prepare().await {
            tracing::warn!("{} setup failed: {}", self.inner.transport.name(), err);
            if self.inner.generation.is_current(generation) {
                self.inner.fail(&err);
            }
            return Err(err);
        }
        self.inner.opened.store(true, Ordering::SeqCst);

        self.connect(generation).await
    }

    async fn connect(&self, generation: u64) -> TransportResult<()> {
        let result = self.inner.transport.connect().await;
        if !self.inner.generation.is_current(generation) {
            tracing::debug!("Discarding superseded connection");
            return Ok(());
        }

        match result {
            Ok(stream) => {
                let connection = Uuid::new_v4();
                tracing::info!("Subscriber connected ({})", connection);
                self.inner.set_status(SubscriberStatus::Connected);
                let handle = Self::spawn_pump(Arc::downgrade(&self.inner), stream, generation, connection);
                if let Some(previous) = self.inner.pump.lock().replace(handle) {
                    previous.abort();
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Subscriber connection failed: {}", err);
                self.inner.fail(&err);
                Err(err)
            }
        }
    }

    fn spawn_pump(
        weak: Weak<SubscriberInner>,
        mut stream: EventStream,
        generation: u64,
        connection: Uuid,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut failure = None;
            while let Some(item) = stream.next().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.generation.is_current(generation) {
                    return;
                }
                match item {
                    Ok(event) => inner.record(event),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }

            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.generation.is_current(generation) {
                return;
            }
            match failure {
                Some(err) => {
                    tracing::warn!("Connection {} dropped: {}", connection, err);
                    inner.fail(&err);
                }
                None => {
                    tracing::warn!("Connection {} closed by server", connection);
                    inner.fail(&TransportError::Closed);
                }
            }
        })
    }

    /// Drop the connection, wait the reconnect delay, connect again.
    ///
    /// Transport setup is not repeated.
    pub async fn reconnect(&self) -> TransportResult<()> {
        let generation = self.inner.generation.advance();
        self.inner.abort_pump();
        self.inner.set_status(SubscriberStatus::Reconnecting);
        tracing::info!("Reconnecting subscriber");

        tokio::time::sleep(self.inner.reconnect_delay).await;
        if !self.inner.generation.is_current(generation) {
            return Ok(());
        }

        self.inner.set_status(SubscriberStatus::Connecting);
        self.connect(generation).await
    }

    /// Close the connection and release transport resources
    pub async fn close(&self) {
        self.inner.generation.advance();
        self.inner.abort_pump();
        self.inner.opened.store(false, Ordering::SeqCst);
        self.inner.transport.shutdown().await;
        self.inner.set_status(SubscriberStatus::Disconnected);
        tracing::info!("Subscriber closed");
    }

    pub fn clear_transcriptions(&self) {
        self.inner.transcriptions.write().clear();
    }

    pub fn clear_alerts(&self) {
        self.inner.alerts.write().clear();
    }

    /// Empty both lists
    pub fn clear(&self) {
        self.clear_transcriptions();
        self.clear_alerts();
    }
}
