//! Registration, lookup and manual alert calls

use super::client::ApiClient;
use super::types::{
    CheckUserResponse, ManualAlertRequest, ManualAlertResponse, RegisterRequest, RegisterResponse,
};
use crate::config::join_url;
use crate::profile::location::validate_coordinates;
use crate::profile::{PremisesProfile, ProfileStore};
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;

/// Outcome of a manual alert trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualAlertOutcome {
    /// Backend answered `status: "ok"`
    Sent,
    /// Backend answered with another status
    Rejected(String),
}

fn validate_registration(request: &RegisterRequest) -> AppResult<()> {
    let missing_text = [
        &request.nombre_local,
        &request.ip_camara,
        &request.ubicacion,
    ]
    .iter()
    .any(|field| field.trim().is_empty());

    if missing_text {
        return Err(AppError::Registration(
            "Todos los campos son requeridos".to_string(),
        ));
    }

    if !validate_coordinates(request.latitud, request.longitud) {
        return Err(AppError::Registration("Coordenadas inválidas".to_string()));
    }

    if request.password.is_empty() {
        return Err(AppError::Registration(
            "La contraseña es requerida".to_string(),
        ));
    }

    Ok(())
}

/// Register a premises with the backend and persist the resulting profile
pub async fn register_premises(
    client: &dyn ApiClient,
    api_base_url: &str,
    store: &ProfileStore,
    request: RegisterRequest,
) -> AppResult<PremisesProfile> {
    validate_registration(&request)?;

    tracing::info!("Registering premises '{}'", request.nombre_local);

    let body = serde_json::to_value(&request)?;
    let response = client
        .post_json(&join_url(api_base_url, "/api/register"), &body)
        .await?;

    let result: RegisterResponse = response.json().unwrap_or_default();

    if !response.is_success() {
        let message = result
            .message
            .unwrap_or_else(|| format!("Error del servidor: {}", response.status));
        tracing::warn!("Registration rejected: {}", message);
        return Err(AppError::Registration(message));
    }

    if !result.success {
        return Err(AppError::Registration(
            result
                .message
                .unwrap_or_else(|| "Error al registrar usuario".to_string()),
        ));
    }

    let profile = PremisesProfile {
        usuario_id: None,
        nombre_local: request.nombre_local,
        ip_camara: request.ip_camara,
        ubicacion: request.ubicacion,
        latitud: request.latitud,
        longitud: request.longitud,
        registered_at: Utc::now(),
    };

    store.save(&profile)?;

    tracing::info!("Premises '{}' registered", profile.nombre_local);
    Ok(profile)
}

/// Ask the backend whether a premises name is taken; any failure reads as "no"
pub async fn check_local_exists(client: &dyn ApiClient, api_base_url: &str, name: &str) -> bool {
    let url = join_url(
        api_base_url,
        &format!("/check-user/{}", urlencoding::encode(name)),
    );

    match client.get(&url).await {
        Ok(response) => response
            .json::<CheckUserResponse>()
            .map(|r| r.exists)
            .unwrap_or(false),
        Err(e) => {
            tracing::warn!("check-user lookup failed: {}", e);
            false
        }
    }
}

/// Trigger a manual alert for the registered premises
pub async fn send_manual_alert(
    client: &dyn ApiClient,
    alert_base_url: &str,
    profile: &PremisesProfile,
) -> AppResult<ManualAlertOutcome> {
    let body = serde_json::to_value(ManualAlertRequest::from(profile))?;
    let response = client
        .post_json(&join_url(alert_base_url, "/alerta_manual"), &body)
        .await?;

    let result: ManualAlertResponse = response.json().unwrap_or_default();

    if result.status == "ok" {
        tracing::info!("Manual alert sent for '{}'", profile.nombre_local);
        Ok(ManualAlertOutcome::Sent)
    } else {
        tracing::warn!(
            "Manual alert not accepted (HTTP {}, status '{}')",
            response.status,
            result.status
        );
        Ok(ManualAlertOutcome::Rejected(result.status))
    }
}
