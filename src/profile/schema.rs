//! Registered premises profile
//!
//! The profile is the one record the client persists. Field names match the
//! backend's registration payload so the stored blob can be replayed as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered premises and its camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremisesProfile {
    /// Backend user id, when the backend returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usuario_id: Option<String>,

    /// Premises name
    pub nombre_local: String,

    /// Camera base URL (e.g. `http://192.168.1.10:8080`)
    pub ip_camara: String,

    /// Human-readable address
    pub ubicacion: String,

    pub latitud: f64,
    pub longitud: f64,

    /// When the premises was registered from this device
    pub registered_at: DateTime<Utc>,
}

impl PremisesProfile {
    /// Camera base URL without a trailing slash
    pub fn camera_base(&self) -> &str {
        self.ip_camara.trim_end_matches('/')
    }

    #[cfg(test)]
    pub(crate) fn sample(camera: &str) -> Self {
        Self {
            usuario_id: None,
            nombre_local: "Bodega Central".to_string(),
            ip_camara: camera.to_string(),
            ubicacion: "Av. Amazonas, Quito".to_string(),
            latitud: -0.1807,
            longitud: -78.4678,
            registered_at: Utc::now(),
        }
    }
}

/// Partial update merged into a stored profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub nombre_local: Option<String>,
    pub ip_camara: Option<String>,
    pub ubicacion: Option<String>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
}

impl ProfileUpdate {
    /// Apply the set fields onto a profile
    pub fn apply(self, profile: &mut PremisesProfile) {
        if let Some(name) = self.nombre_local {
            profile.nombre_local = name;
        }
        if let Some(camera) = self.ip_camara {
            profile.ip_camara = camera;
        }
        if let Some(address) = self.ubicacion {
            profile.ubicacion = address;
        }
        if let Some(lat) = self.latitud {
            profile.latitud = lat;
        }
        if let Some(lng) = self.longitud {
            profile.longitud = lng;
        }
    }
}
