//! Error types and handling
//!
//! Common error types used across the client core.

use crate::backend::TransportError;
use crate::config::ConfigError;
use crate::profile::ProfileError;
use crate::streaming::SessionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Profile(#[from] ProfileError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("No premises registered")]
    NotRegistered,
}

/// Error response for the front end
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Session(SessionError::Busy) => "BUSY",
            AppError::Session(_) => "SESSION_ERROR",
            AppError::Profile(_) => "PROFILE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Registration(_) => "REGISTRATION_ERROR",
            AppError::NotRegistered => "NOT_REGISTERED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
