//! Pipeline channel abstraction
//!
//! A channel is one remote service the master switch starts and stops
//! together with the others (video detection, audio capture).

use crate::backend::{ApiClient, CapturePayload};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Session-level errors. Messages are user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Camera did not answer any probe
    #[error("{0}")]
    Unreachable(String),

    /// Backend answered with a non-2xx status
    #[error("{0}")]
    Rejected(String),

    /// Request never got an answer
    #[error("{0}")]
    Network(String),

    /// A newer start/stop replaced this one while it was in flight
    #[error("Superseded by a newer request")]
    Superseded,

    /// Another activation or deactivation is in flight
    #[error("Another activation or deactivation is in progress")]
    Busy,

    /// Master switch transition failed
    #[error("{0}")]
    Switch(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A remote service that can be told to start and stop
#[async_trait]
pub trait PipelineChannel: Send + Sync {
    /// Unique identifier for this channel
    fn id(&self) -> &str;

    /// Ask the service to start
    async fn start(&self) -> SessionResult<()>;

    /// Ask the service to stop
    async fn stop(&self) -> SessionResult<()>;

    /// Whether the last successful call was a start
    fn is_active(&self) -> bool;
}

/// Monotonic request tag; a completion whose tag is no longer current is stale
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    /// Start a new generation and return its tag
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, tag: u64) -> bool {
        self.current() == tag
    }
}

/// POST a capture payload and map the outcome to a prefixed, user-facing error
pub(crate) async fn post_command(
    client: &dyn ApiClient,
    url: &str,
    payload: &CapturePayload,
    error_prefix: &str,
) -> SessionResult<()> {
    let body = serde_json::to_value(payload)
        .map_err(|e| SessionError::Network(format!("{}: {}", error_prefix, e)))?;

    match client.post_json(url, &body).await {
        Ok(response) if response.is_success() => Ok(()),
        Ok(response) => Err(SessionError::Rejected(format!(
            "{}: {}",
            error_prefix, response.body
        ))),
        Err(e) => Err(SessionError::Network(format!("{}: {}", error_prefix, e))),
    }
}
