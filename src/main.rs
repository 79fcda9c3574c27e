use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kuntur_client::backend::{ManualAlertOutcome, RegisterRequest};
use kuntur_client::commands::{self, AppState};
use kuntur_client::config::{KunturConfig, TransportKind};
use kuntur_client::events::{LiveEvent, SubscriberStatus};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(name = "kuntur", version, about = "Kuntur premises client")]
struct Cli {
    /// JSON config file; KUNTUR_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register this premises with the backend
    Register {
        #[arg(long)]
        name: String,
        /// Camera base URL, e.g. http://192.168.1.10:8080
        #[arg(long)]
        camera: String,
        /// Coordinates as "lat, lng"
        #[arg(long)]
        location: String,
        /// Street address; defaults to an approximate label from the coordinates
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        password: String,
    },
    /// Show or clear the registered profile
    Profile {
        #[arg(long)]
        clear: bool,
    },
    /// Probe the registered camera
    Probe,
    /// Show the master switch status
    Status,
    /// Turn detection on
    Activate {
        /// Keep running, following the feed, until Ctrl-C; then turn detection off
        #[arg(long)]
        hold: bool,
    },
    /// Turn detection off
    Deactivate,
    /// Print live transcriptions and alerts until Ctrl-C
    Watch {
        /// sse or socket; overrides the configured transport
        #[arg(long)]
        transport: Option<TransportKind>,
    },
    /// Send a manual alert
    Alert,
}

#[tokio::main]
async fn main() -> ExitCode {
    kuntur_client::init_tracing();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = KunturConfig::load(cli.config.as_deref()).context("loading configuration")?;

    if let Commands::Watch {
        transport: Some(kind),
    } = &cli.command
    {
        config.transport = *kind;
    }

    let state = AppState::new(config)?;

    match cli.command {
        Commands::Register {
            name,
            camera,
            location,
            address,
            password,
        } => {
            let (latitud, longitud, label) = commands::profile::resolve_location(&location)?;
            let request = RegisterRequest {
                nombre_local: name,
                ubicacion: address.unwrap_or(label),
                ip_camara: camera,
                latitud,
                longitud,
                password,
            };
            let profile = commands::profile::register_premises(&state, request).await?;
            print_json(&profile)?;
        }
        Commands::Profile { clear } => {
            if clear {
                commands::profile::clear_profile(&state).await?;
                println!("Profile cleared");
            } else {
                match commands::profile::get_profile(&state).await? {
                    Some(profile) => print_json(&profile)?,
                    None => {
                        println!("No premises registered");
                        return Ok(ExitCode::from(2));
                    }
                }
            }
        }
        Commands::Probe => {
            let report = commands::session::test_camera_connectivity(&state).await?;
            print_json(&report)?;
            if !report.reachable {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Status => {
            commands::session::fetch_switch_status(&state).await?;
            print_json(&commands::session::get_switch_state(&state).await?)?;
        }
        Commands::Activate { hold } => {
            let switch = commands::session::activate_kuntur(&state).await?;
            print_json(&switch)?;
            if hold {
                hold_active(&state).await?;
            }
        }
        Commands::Deactivate => {
            print_json(&commands::session::deactivate_kuntur(&state).await?)?;
        }
        Commands::Watch { .. } => return watch(&state).await,
        Commands::Alert => match commands::alert::send_manual_alert(&state).await? {
            ManualAlertOutcome::Sent => println!("Alerta enviada"),
            ManualAlertOutcome::Rejected(status) => {
                println!("Alerta no aceptada: {}", status);
                return Ok(ExitCode::from(2));
            }
        },
    }

    Ok(ExitCode::from(0))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn hold_active(state: &AppState) -> Result<()> {
    let pipeline = state.pipeline().await?;
    let keepalive = pipeline.video.spawn_keepalive();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let video = pipeline.video.state();
                let audio = pipeline.audio.state();
                println!(
                    "video={:?} url={} audio_level={:.0}",
                    video.status, video.stream_url, audio.level
                );
            }
        }
    }

    keepalive.abort();
    print_json(&commands::session::deactivate_kuntur(state).await?)?;
    Ok(())
}

async fn watch(state: &AppState) -> Result<ExitCode> {
    let subscriber = state.subscriber().await?;
    let mut events = subscriber.subscribe();
    let mut status = subscriber.status_watch();

    let opened = commands::events::open_live_events(state).await?;
    status.borrow_and_update();
    println!("status={:?}", opened);
    if matches!(opened, SubscriberStatus::Error | SubscriberStatus::Failed) {
        if let Some(error) = subscriber.last_error() {
            eprintln!("{}", error);
        }
        return Ok(ExitCode::from(2));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                println!("status={:?}", current);
                if matches!(current, SubscriberStatus::Error | SubscriberStatus::Failed) {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(LiveEvent::Transcription(text)) => println!("transcripcion: {}", text),
                Ok(LiveEvent::Alert(record)) => println!("alerta [{}]: {}", record.received_at, record.payload),
                Err(RecvError::Lagged(skipped)) => tracing::warn!("Skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    commands::events::close_live_events(state).await?;
    println!(
        "{} transcripciones, {} alertas",
        subscriber.transcriptions().len(),
        subscriber.alerts().len()
    );
    Ok(ExitCode::from(0))
}
