//! Backend request and response bodies
//!
//! Field names follow the backend's wire format (Spanish snake_case).

use crate::profile::PremisesProfile;
use serde::{Deserialize, Serialize};

/// Body shared by the capture and detection start/stop endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturePayload {
    pub latitud: f64,
    pub longitud: f64,
    pub nombre_local: String,
    /// Media URL the backend should pull from (not the bare camera address)
    pub ip_camara: String,
}

impl CapturePayload {
    /// Payload for the audio capture service (`<camera>/audio.wav`)
    pub fn audio(profile: &PremisesProfile) -> Self {
        Self::with_media_path(profile, "audio.wav")
    }

    /// Payload for the video detection service (`<camera>/video_feed`)
    pub fn detection(profile: &PremisesProfile) -> Self {
        Self::with_media_path(profile, "video_feed")
    }

    fn with_media_path(profile: &PremisesProfile, path: &str) -> Self {
        Self {
            latitud: profile.latitud,
            longitud: profile.longitud,
            nombre_local: profile.nombre_local.clone(),
            ip_camara: crate::config::join_url(&profile.ip_camara, path),
        }
    }
}

/// `POST /api/register` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub nombre_local: String,
    pub ubicacion: String,
    pub ip_camara: String,
    pub latitud: f64,
    pub longitud: f64,
    pub password: String,
}

/// `POST /api/register` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /check-user/<name>` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckUserResponse {
    #[serde(default)]
    pub exists: bool,
}

/// `POST /alerta_manual` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAlertRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario_id: Option<String>,
    pub nombre_local: String,
    pub ip_camara: String,
    pub ubicacion: String,
    pub latitud: f64,
    pub longitud: f64,
}

impl From<&PremisesProfile> for ManualAlertRequest {
    fn from(profile: &PremisesProfile) -> Self {
        Self {
            usuario_id: profile.usuario_id.clone(),
            nombre_local: profile.nombre_local.clone(),
            ip_camara: profile.ip_camara.clone(),
            ubicacion: profile.ubicacion.clone(),
            latitud: profile.latitud,
            longitud: profile.longitud,
        }
    }
}

/// `POST /alerta_manual` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualAlertResponse {
    #[serde(default)]
    pub status: String,
}
