//! Live event transport trait

use super::parse::LiveEvent;
use crate::backend::TransportResult;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Decoded events from one open connection. The stream ends when the
/// connection drops.
pub type EventStream = BoxStream<'static, TransportResult<LiveEvent>>;

/// A server-push channel the subscriber can open and close
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// One-time setup before the first connection. Not repeated on reconnect.
    async fn prepare(&self) -> TransportResult<()> {
        Ok(())
    }

    /// Open a connection
    async fn connect(&self) -> TransportResult<EventStream>;

    /// Release server-side resources when the subscriber closes. Failures
    /// are logged, never returned.
    async fn shutdown(&self) {}
}
