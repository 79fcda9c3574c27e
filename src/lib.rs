//! Kuntur client core
//!
//! Session coordination for the Kuntur premises surveillance client: the
//! camera feed, remote audio capture, the master switch that drives the
//! detection pipeline, and the live event stream of transcriptions and
//! alerts.

pub mod backend;
pub mod commands;
pub mod config;
pub mod events;
pub mod profile;
pub mod streaming;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kuntur_client=debug,kuntur=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
