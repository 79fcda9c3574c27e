//! Live events pushed by the backend
//!
//! Transcriptions and alerts arrive over one of two transports chosen by
//! configuration: a server-sent event stream or a Socket.IO websocket.

mod parse;
mod socket;
mod sse;
mod subscriber;
mod transport;

pub use parse::{
    parse_engine_packet, parse_push_payload, socket_event, AlertRecord, EnginePacket, LiveEvent,
    SseDecoder, TRANSCRIPTION_EVENT,
};
pub use socket::{socket_io_url, SocketTransport};
pub use sse::SseTransport;
pub use subscriber::{LiveEventSubscriber, SubscriberStatus};
pub use transport::{EventStream, EventTransport};

use crate::backend::{ApiClient, CapturePayload, TransportResult};
use crate::config::{KunturConfig, TransportKind};
use crate::profile::PremisesProfile;
use std::sync::Arc;

/// Build the configured transport. The socket transport brackets its session
/// with capture start/stop when a profile is known.
pub fn build_transport(
    config: &KunturConfig,
    client: Arc<dyn ApiClient>,
    profile: Option<&PremisesProfile>,
) -> TransportResult<Arc<dyn EventTransport>> {
    let transport: Arc<dyn EventTransport> = match config.transport {
        TransportKind::EventStream => Arc::new(SseTransport::new(
            &config.event_stream_url,
            config.timings.request_timeout(),
        )?),
        TransportKind::DuplexSocket => {
            let socket = SocketTransport::new(&config.socket_url);
            match profile {
                Some(profile) => Arc::new(socket.with_capture(
                    client,
                    &config.audio_service_url,
                    CapturePayload::audio(profile),
                )),
                None => Arc::new(socket),
            }
        }
    };
    tracing::debug!("Using {} transport", transport.name());
    Ok(transport)
}

/// Subscriber over the configured transport
pub fn build_subscriber(
    config: &KunturConfig,
    client: Arc<dyn ApiClient>,
    profile: Option<&PremisesProfile>,
) -> TransportResult<LiveEventSubscriber> {
    let transport = build_transport(config, client, profile)?;
    Ok(LiveEventSubscriber::new(
        transport,
        config.timings.event_reconnect_delay(),
    ))
}
