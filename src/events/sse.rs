//! Event-stream (SSE) transport

use super::parse::{parse_push_payload, SseDecoder};
use super::transport::{EventStream, EventTransport};
use crate::backend::{TransportError, TransportResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Long-lived `GET` on the backend's event stream
pub struct SseTransport {
    client: reqwest::Client,
    url: String,
}

impl SseTransport {
    /// The stream stays open indefinitely, so only the connect phase is bounded
    pub fn new(url: &str, connect_timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    fn name(&self) -> &'static str {
        "event-stream"
    }

    async fn connect(&self) -> TransportResult<EventStream> {
        tracing::debug!("Opening event stream {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = SseDecoder::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .iter()
                    .flat_map(|data| parse_push_payload(data))
                    .map(Ok)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(TransportError::from(e))],
            })
            .flat_map(futures::stream::iter);

        Ok(events.boxed())
    }
}
