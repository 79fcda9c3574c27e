//! Push payload decoding
//!
//! Framing for the two live transports (event-stream lines and Engine.IO /
//! Socket.IO packets) and the classification of decoded payloads into
//! transcriptions and alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Socket.IO event carrying a transcription
pub const TRANSCRIPTION_EVENT: &str = "new_transcription";

/// An alert as received, stamped with its arrival time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

/// A decoded live event
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Transcription(String),
    Alert(AlertRecord),
}

/// Classify one JSON push payload.
///
/// A payload may be both a transcription and an alert. Anything that is not
/// a JSON object yields nothing.
pub fn parse_push_payload(raw: &str) -> Vec<LiveEvent> {
    let payload: Value = match serde_json::from_str(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => return Vec::new(),
        Err(e) => {
            tracing::debug!("Dropping malformed push payload: {}", e);
            return Vec::new();
        }
    };

    let tipo = payload.get("tipo").and_then(Value::as_str);
    let mensaje = payload.get("mensaje").and_then(Value::as_str);

    let mut events = Vec::new();

    let is_transcription =
        tipo == Some("transcripcion") || mensaje.is_some_and(|m| m.contains("Transcripción"));
    if is_transcription {
        if let Some(texto) = payload.get("texto").and_then(Value::as_str) {
            events.push(LiveEvent::Transcription(texto.to_string()));
        }
    }

    let is_alert = tipo == Some("alerta") || mensaje.is_some_and(|m| m.starts_with('🚨'));
    if is_alert {
        events.push(LiveEvent::Alert(AlertRecord {
            received_at: Utc::now(),
            payload,
        }));
    }

    events
}

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the data of every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut completed = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');

            if line.is_empty() {
                if !self.data.is_empty() {
                    let data = self.data.join("\n");
                    self.data.clear();
                    if !data.trim().is_empty() {
                        completed.push(data);
                    }
                }
                continue;
            }

            // Comment / keep-alive
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }

        completed
    }
}

/// One Engine.IO v4 packet, with Socket.IO packets on the default namespace
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// `0{...}` handshake
    Open,
    /// `2`
    Ping,
    /// `3`
    Pong,
    /// `40`
    Connect,
    /// `41`
    Disconnect,
    /// `42["name", data]`
    Event { name: String, data: Value },
    /// `44{...}`
    ConnectError(String),
    Unknown,
}

/// Parse a text frame
pub fn parse_engine_packet(frame: &str) -> EnginePacket {
    let mut chars = frame.chars();
    match chars.next() {
        Some('0') => EnginePacket::Open,
        Some('2') => EnginePacket::Ping,
        Some('3') => EnginePacket::Pong,
        Some('4') => parse_socket_packet(chars.as_str()),
        _ => EnginePacket::Unknown,
    }
}

fn parse_socket_packet(packet: &str) -> EnginePacket {
    let mut chars = packet.chars();
    let kind = chars.next();
    let body = chars.as_str();

    match kind {
        Some('0') => EnginePacket::Connect,
        Some('1') => EnginePacket::Disconnect,
        Some('2') => {
            let Ok(Value::Array(mut items)) = serde_json::from_str::<Value>(body) else {
                return EnginePacket::Unknown;
            };
            if items.is_empty() {
                return EnginePacket::Unknown;
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                _ => return EnginePacket::Unknown,
            };
            let data = if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            };
            EnginePacket::Event { name, data }
        }
        Some('4') => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            EnginePacket::ConnectError(message)
        }
        _ => EnginePacket::Unknown,
    }
}

/// Turn a Socket.IO event into a transcription; blank text is dropped
pub fn socket_event(name: &str, data: &Value) -> Option<LiveEvent> {
    if name != TRANSCRIPTION_EVENT {
        return None;
    }
    let text = data.get("text").and_then(Value::as_str)?.trim();
    if text.is_empty() {
        return None;
    }
    Some(LiveEvent::Transcription(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcription_by_tipo() {
        let events = parse_push_payload(r#"{"tipo":"transcripcion","texto":"hola"}"#);
        assert_eq!(events, vec![LiveEvent::Transcription("hola".to_string())]);
    }

    #[test]
    fn test_transcription_by_mensaje_needs_texto() {
        let events = parse_push_payload(r#"{"mensaje":"Transcripción lista"}"#);
        assert!(events.is_empty());

        let events = parse_push_payload(r#"{"mensaje":"Nueva Transcripción","texto":"ayuda"}"#);
        assert_eq!(events, vec![LiveEvent::Transcription("ayuda".to_string())]);
    }

    #[test]
    fn test_alert_keeps_full_payload() {
        let events = parse_push_payload(r#"{"mensaje":"🚨 Robo detectado","nivel":3}"#);
        assert_eq!(events.len(), 1);
        match &events[0] {
            LiveEvent::Alert(record) => {
                assert_eq!(record.payload["nivel"], 3);
                assert_eq!(record.payload["mensaje"], "🚨 Robo detectado");
            }
            other => panic!("expected alert, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_can_be_both() {
        let events = parse_push_payload(r#"{"tipo":"alerta","mensaje":"Transcripción: robo","texto":"robo"}"#);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], LiveEvent::Transcription("robo".to_string()));
        assert!(matches!(events[1], LiveEvent::Alert(_)));
    }

    #[test]
    fn test_malformed_and_unrelated_payloads_are_dropped() {
        assert!(parse_push_payload("not json").is_empty());
        assert!(parse_push_payload("[1,2]").is_empty());
        assert!(parse_push_payload(r#"{"tipo":"heartbeat"}"#).is_empty());
    }

    #[test]
    fn test_sse_decoder_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"tipo\":").is_empty());
        assert!(decoder.push(b"\"alerta\"}\n").is_empty());
        assert_eq!(decoder.push(b"\n"), vec![r#"{"tipo":"alerta"}"#.to_string()]);
    }

    #[test]
    fn test_sse_decoder_multiline_comments_and_crlf() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b": keep-alive\r\n\r\nevent: message\r\ndata: first\r\ndata:second\r\n\r\ndata:\r\n\r\n",
        );
        assert_eq!(events, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn test_engine_packets() {
        assert_eq!(parse_engine_packet(r#"0{"sid":"abc","pingInterval":25000}"#), EnginePacket::Open);
        assert_eq!(parse_engine_packet("2"), EnginePacket::Ping);
        assert_eq!(parse_engine_packet("3"), EnginePacket::Pong);
        assert_eq!(parse_engine_packet(r#"40{"sid":"x"}"#), EnginePacket::Connect);
        assert_eq!(parse_engine_packet("41"), EnginePacket::Disconnect);
        assert_eq!(
            parse_engine_packet(r#"42["new_transcription",{"text":" hola "}]"#),
            EnginePacket::Event {
                name: "new_transcription".to_string(),
                data: json!({"text": " hola "}),
            }
        );
        assert_eq!(
            parse_engine_packet(r#"44{"message":"Not authorized"}"#),
            EnginePacket::ConnectError("Not authorized".to_string())
        );
        assert_eq!(parse_engine_packet("6"), EnginePacket::Unknown);
        assert_eq!(parse_engine_packet("42not json"), EnginePacket::Unknown);
    }

    #[test]
    fn test_socket_transcriptions_are_trimmed() {
        assert_eq!(
            socket_event(TRANSCRIPTION_EVENT, &json!({"text": "  auxilio \n"})),
            Some(LiveEvent::Transcription("auxilio".to_string()))
        );
        assert_eq!(socket_event(TRANSCRIPTION_EVENT, &json!({"text": "   "})), None);
        assert_eq!(socket_event("other", &json!({"text": "x"})), None);
    }
}
