//! Socket.IO transport
//!
//! Speaks just enough Engine.IO v4 over a raw WebSocket to receive
//! `new_transcription` events: answer pings, join the default namespace
//! after the handshake, decode event packets.

use super::parse::{parse_engine_packet, socket_event, EnginePacket};
use super::transport::{EventStream, EventTransport};
use crate::backend::{ApiClient, CapturePayload, TransportError, TransportResult};
use crate::config::join_url;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Capture service calls bracketing the socket session
struct CaptureControl {
    client: Arc<dyn ApiClient>,
    start_url: String,
    stop_url: String,
    payload: CapturePayload,
}

pub struct SocketTransport {
    socket_url: String,
    capture: Option<CaptureControl>,
}

impl SocketTransport {
    /// Socket without capture control
    pub fn new(socket_url: &str) -> Self {
        Self {
            socket_url: socket_url.to_string(),
            capture: None,
        }
    }

    /// Start capture on the audio service before connecting and stop it on shutdown
    pub fn with_capture(
        mut self,
        client: Arc<dyn ApiClient>,
        audio_service_url: &str,
        payload: CapturePayload,
    ) -> Self {
        self.capture = Some(CaptureControl {
            client,
            start_url: join_url(audio_service_url, "/audio/start-capture"),
            stop_url: join_url(audio_service_url, "/audio/stop-capture"),
            payload,
        });
        self
    }
}

/// `ws(s)://host/socket.io/?EIO=4&transport=websocket` for an http(s) base
pub fn socket_io_url(base: &str) -> TransportResult<String> {
    let mut url =
        reqwest::Url::parse(base).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TransportError::InvalidUrl(format!("unsupported scheme {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidUrl(base.to_string()))?;

    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url.to_string())
}

/// Aborts the reader task when the event stream is dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl EventTransport for SocketTransport {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn prepare(&self) -> TransportResult<()> {
        let Some(capture) = &self.capture else {
            return Ok(());
        };

        tracing::info!("Starting audio capture before opening socket");
        let body = serde_json::to_value(&capture.payload)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let response = capture.client.post_json(&capture.start_url, &body).await?;
        if !response.is_success() {
            return Err(TransportError::Rejected {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }

    async fn connect(&self) -> TransportResult<EventStream> {
        let url = socket_io_url(&self.socket_url)?;
        tracing::debug!("Opening socket {}", url);

        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut sink, mut source) = socket.split();
        let (tx, rx) = mpsc::channel::<TransportResult<_>>(64);

        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let frame = match message {
                    Ok(Message::Text(frame)) => frame,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = tx.send(Err(TransportError::from(e))).await;
                        break;
                    }
                };

                let reply = match parse_engine_packet(&frame) {
                    EnginePacket::Open => Some("40"),
                    EnginePacket::Ping => Some("3"),
                    EnginePacket::Event { name, data } => {
                        if let Some(event) = socket_event(&name, &data) {
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        None
                    }
                    EnginePacket::ConnectError(message) => {
                        let _ = tx.send(Err(TransportError::Refused(message))).await;
                        break;
                    }
                    EnginePacket::Disconnect => break,
                    EnginePacket::Connect | EnginePacket::Pong | EnginePacket::Unknown => None,
                };

                if let Some(reply) = reply {
                    if let Err(e) = sink.send(Message::Text(reply.to_string())).await {
                        let _ = tx.send(Err(TransportError::from(e))).await;
                        break;
                    }
                }
            }
            tracing::debug!("Socket reader finished");
        });

        let stream = futures::stream::unfold((rx, AbortOnDrop(reader)), |(mut rx, guard)| async move {
            rx.recv().await.map(|item| (item, (rx, guard)))
        });
        Ok(stream.boxed())
    }

    async fn shutdown(&self) {
        let Some(capture) = &self.capture else {
            return;
        };

        let body = match serde_json::to_value(&capture.payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Could not encode stop-capture payload: {}", e);
                return;
            }
        };

        // Bounded by the client's request timeout
        match capture.client.post_json(&capture.stop_url, &body).await {
            Ok(response) if response.is_success() => tracing::info!("Audio capture stopped"),
            Ok(response) => tracing::warn!("Stop capture returned {}: {}", response.status, response.body),
            Err(e) => tracing::warn!("Stop capture failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::ScriptedClient;
    use crate::profile::PremisesProfile;

    fn transport(client: Arc<ScriptedClient>) -> SocketTransport {
        let profile = PremisesProfile::sample("http://10.0.0.5:8080");
        SocketTransport::new("http://10.0.0.9:5000").with_capture(
            client,
            "http://audio:5001",
            CapturePayload::audio(&profile),
        )
    }

    #[test]
    fn test_socket_io_url() {
        assert_eq!(
            socket_io_url("http://10.0.0.9:5000").unwrap(),
            "ws://10.0.0.9:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_io_url("https://events.example.com/api/").unwrap(),
            "wss://events.example.com/api/socket.io/?EIO=4&transport=websocket"
        );
        assert!(socket_io_url("ftp://host").is_err());
        assert!(socket_io_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_prepare_rejection_is_reported() {
        let client = Arc::new(ScriptedClient::new().reply("/audio/start-capture", 409, "already running"));
        let err = transport(client.clone()).prepare().await.unwrap_err();

        assert!(err.is_rejection());
        assert_eq!(client.urls(), vec!["http://audio:5001/audio/start-capture"]);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_stop_capture() {
        let client = Arc::new(ScriptedClient::new().reply("/audio/stop-capture", 500, "nope"));
        transport(client.clone()).shutdown().await;

        assert_eq!(client.urls(), vec!["http://audio:5001/audio/stop-capture"]);
    }

    #[tokio::test]
    async fn test_plain_socket_has_no_capture_calls() {
        let transport = SocketTransport::new("http://10.0.0.9:5000");
        assert!(transport.prepare().await.is_ok());
        transport.shutdown().await;
    }
}
