//! Backend access
//!
//! HTTP client seam, wire types, and the one-shot registration/alert calls.

pub mod api;
pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{check_local_exists, register_premises, send_manual_alert, ManualAlertOutcome};
pub use client::{ApiClient, ApiResponse, HttpApiClient, TransportError, TransportResult};
pub use types::{CapturePayload, RegisterRequest};
