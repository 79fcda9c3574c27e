//! Premises profile
//!
//! Schema, single-blob persistence and coordinate helpers for the one
//! registered premises.

pub mod location;
pub mod schema;
pub mod store;

pub use schema::{PremisesProfile, ProfileUpdate};
pub use store::{ProfileStore, PROFILE_STORAGE_KEY};

use thiserror::Error;

/// Profile-related errors
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No profile stored")]
    NotFound,
}
