//! End-to-end tests against a local axum server standing in for the camera
//! and the Kuntur backends.
//!
//! Run: `cargo test --test integration`

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde_json::json;
use tempfile::TempDir;

use kuntur_client::backend::{CapturePayload, HttpApiClient, RegisterRequest};
use kuntur_client::commands::{self, AppState};
use kuntur_client::config::{KunturConfig, TimingConfig, TransportKind};
use kuntur_client::events::{LiveEventSubscriber, SocketTransport, SubscriberStatus};
use kuntur_client::profile::PremisesProfile;
use kuntur_client::streaming::{SwitchStatus, VideoStatus};

// ── Fake backend ─────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    detection_starts: AtomicUsize,
    detection_stops: AtomicUsize,
    capture_stops: AtomicUsize,
}

async fn event_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let payloads = [
        r#"{"tipo":"transcripcion","texto":"hay alguien en la puerta"}"#,
        "no es json",
        r#"{"tipo":"alerta","mensaje":"🚨 Persona sospechosa"}"#,
        r#"{"mensaje":"Transcripción parcial","texto":"abran"}"#,
    ];
    Sse::new(futures::stream::iter(
        payloads.map(|payload| Ok(Event::default().data(payload))),
    ))
}

async fn socket_io(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(socket_session)
}

async fn wait_for_text(socket: &mut WebSocket, expected: &str) -> bool {
    while let Some(Ok(message)) = socket.recv().await {
        if let WsMessage::Text(text) = message {
            if text == expected {
                return true;
            }
        }
    }
    false
}

async fn socket_session(mut socket: WebSocket) {
    let open = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if socket.send(WsMessage::Text(open.to_string())).await.is_err() {
        return;
    }
    if !wait_for_text(&mut socket, "40").await {
        return;
    }

    let _ = socket.send(WsMessage::Text(r#"40{"sid":"xyz"}"#.to_string())).await;
    let _ = socket.send(WsMessage::Text("2".to_string())).await;
    if !wait_for_text(&mut socket, "3").await {
        return;
    }

    for frame in [
        r#"42["new_transcription",{"text":"  hola  "}]"#,
        r#"42["new_transcription",{"text":"   "}]"#,
        r#"42["other_event",{"text":"ignorado"}]"#,
        r#"42["new_transcription",{"text":"adios"}]"#,
    ] {
        let _ = socket.send(WsMessage::Text(frame.to_string())).await;
    }
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn spawn_backend(counters: Arc<Counters>) -> String {
    let starts = counters.clone();
    let stops = counters.clone();
    let capture_stops = counters;

    let app = Router::new()
        // The camera only answers its status endpoint
        .route("/status.json", get(|| async { Json(json!({"video_connections": 0})) }))
        .route(
            "/api/register",
            post(|| async { Json(json!({"success": true, "message": "ok"})) }),
        )
        .route(
            "/start_detection",
            post(move || {
                starts.detection_starts.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({"status": "ok"})) }
            }),
        )
        .route(
            "/stop_detection",
            post(move || {
                stops.detection_stops.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({"status": "ok"})) }
            }),
        )
        .route(
            "/audio/start-capture",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "device busy") }),
        )
        .route(
            "/audio/stop-capture",
            post(move || {
                capture_stops.capture_stops.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({"status": "stopped"})) }
            }),
        )
        .route("/stream", get(event_stream))
        .route("/socket.io/", get(socket_io));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ── Helpers ──────────────────────────────────────────────────────────

fn app_state(base: &str, transport: TransportKind) -> (AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = KunturConfig {
        api_base_url: base.to_string(),
        alert_base_url: base.to_string(),
        audio_service_url: base.to_string(),
        video_service_url: base.to_string(),
        event_stream_url: format!("{}/stream", base),
        socket_url: base.to_string(),
        transport,
        data_dir: dir.path().to_path_buf(),
        timings: TimingConfig::immediate(),
    };
    let client = HttpApiClient::new(Duration::from_secs(5), Duration::from_secs(2)).unwrap();
    (AppState::with_client(config, Arc::new(client)), dir)
}

async fn register(state: &AppState, camera: &str) {
    let request = RegisterRequest {
        nombre_local: "Farmacia Sur".to_string(),
        ubicacion: "Av. Loja".to_string(),
        ip_camara: camera.to_string(),
        latitud: -2.9,
        longitud: -79.0,
        password: "clave".to_string(),
    };
    commands::profile::register_premises(state, request)
        .await
        .unwrap();
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_camera_reachable_through_status_endpoint_only() {
    let base = spawn_backend(Arc::new(Counters::default())).await;
    let (state, _dir) = app_state(&base, TransportKind::EventStream);
    register(&state, &base).await;

    let report = commands::session::test_camera_connectivity(&state)
        .await
        .unwrap();
    assert!(report.reachable);
    assert_eq!(report.endpoint, Some(format!("{}/status.json", base)));

    let video = commands::session::start_video(&state).await.unwrap();
    assert!(video.streaming);
    assert_eq!(video.status, VideoStatus::Streaming);
    assert!(video.stream_url.starts_with(&format!("{}/videofeed?", base)));
}

#[tokio::test]
async fn test_busy_audio_device_rolls_back_activation() {
    let counters = Arc::new(Counters::default());
    let base = spawn_backend(counters.clone()).await;
    let (state, _dir) = app_state(&base, TransportKind::EventStream);
    register(&state, &base).await;

    let err = commands::session::activate_kuntur(&state).await.unwrap_err();

    assert_eq!(
        err.message,
        "Error al activar Kuntur: Error al activar audio: device busy"
    );
    let switch = commands::session::get_switch_state(&state).await.unwrap();
    assert_eq!(switch.status, SwitchStatus::Off);
    assert!(!switch.loading);

    let audio = commands::session::get_audio_state(&state).await.unwrap();
    assert!(!audio.streaming);
    assert_eq!(
        audio.error.as_deref(),
        Some("Error al activar audio: device busy")
    );

    assert_eq!(counters.detection_starts.load(Ordering::SeqCst), 1);
    assert_eq!(counters.detection_stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_event_stream_fills_lists_then_reports_drop() {
    let base = spawn_backend(Arc::new(Counters::default())).await;
    let (state, _dir) = app_state(&base, TransportKind::EventStream);

    commands::events::open_live_events(&state).await.unwrap();
    let subscriber = state.subscriber().await.unwrap();

    wait_until(|| subscriber.status() == SubscriberStatus::Error).await;

    assert_eq!(
        subscriber.transcriptions(),
        vec!["hay alguien en la puerta".to_string(), "abran".to_string()]
    );
    let alerts = subscriber.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].payload["mensaje"], "🚨 Persona sospechosa");

    commands::events::clear_live_events(&state, None).await.unwrap();
    assert!(subscriber.transcriptions().is_empty());
    assert!(subscriber.alerts().is_empty());
}

#[tokio::test]
async fn test_missing_event_stream_is_failed() {
    let base = spawn_backend(Arc::new(Counters::default())).await;
    let (mut state, _dir) = app_state(&base, TransportKind::EventStream);
    state.config.event_stream_url = format!("{}/no-stream", base);

    let status = commands::events::open_live_events(&state).await.unwrap();
    assert_eq!(status, SubscriberStatus::Failed);
}

#[tokio::test]
async fn test_socket_transport_answers_ping_and_decodes_transcriptions() {
    let base = spawn_backend(Arc::new(Counters::default())).await;
    let (state, _dir) = app_state(&base, TransportKind::DuplexSocket);

    let status = commands::events::open_live_events(&state).await.unwrap();
    assert_eq!(status, SubscriberStatus::Connected);
    let subscriber = state.subscriber().await.unwrap();

    wait_until(|| subscriber.status() == SubscriberStatus::Error).await;
    assert_eq!(
        subscriber.transcriptions(),
        vec!["hola".to_string(), "adios".to_string()]
    );
}

#[tokio::test]
async fn test_socket_capture_start_rejection_is_failed() {
    let base = spawn_backend(Arc::new(Counters::default())).await;
    let (state, _dir) = app_state(&base, TransportKind::DuplexSocket);
    register(&state, &base).await;

    let status = commands::events::open_live_events(&state).await.unwrap();
    assert_eq!(status, SubscriberStatus::Failed);
    assert!(state
        .subscriber()
        .await
        .unwrap()
        .last_error()
        .unwrap()
        .contains("device busy"));
}

#[test]
fn test_socket_close_stops_capture_before_runtime_exits() {
    let counters = Arc::new(Counters::default());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let base = spawn_backend(counters.clone()).await;
        let profile = PremisesProfile {
            usuario_id: None,
            nombre_local: "Farmacia Sur".to_string(),
            ip_camara: base.clone(),
            ubicacion: "Av. Loja".to_string(),
            latitud: -2.9,
            longitud: -79.0,
            registered_at: chrono::Utc::now(),
        };
        let client = HttpApiClient::new(Duration::from_secs(5), Duration::from_secs(2)).unwrap();
        let transport = SocketTransport::new(&base).with_capture(
            Arc::new(client),
            &base,
            CapturePayload::audio(&profile),
        );
        let subscriber = LiveEventSubscriber::new(Arc::new(transport), Duration::ZERO);

        subscriber.close().await;
    });
    drop(runtime);

    assert_eq!(counters.capture_stops.load(Ordering::SeqCst), 1);
}
