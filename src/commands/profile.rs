//! Registration and profile commands

use super::{to_response, AppState, CommandResult};
use crate::backend::{self, RegisterRequest};
use crate::profile::location::{approximate_label, parse_coordinate_string};
use crate::profile::{PremisesProfile, ProfileUpdate};
use crate::utils::error::{AppError, ErrorResponse};

/// Register the premises and make it the active profile
pub async fn register_premises(
    state: &AppState,
    request: RegisterRequest,
) -> CommandResult<PremisesProfile> {
    let profile = backend::register_premises(
        state.client.as_ref(),
        &state.config.api_base_url,
        &state.store,
        request,
    )
    .await?;

    state.reset_sessions().await;
    Ok(profile)
}

/// Stored profile, if any
pub async fn get_profile(state: &AppState) -> CommandResult<Option<PremisesProfile>> {
    state.store.load().map_err(to_response)
}

/// Merge changes into the stored profile
pub async fn update_profile(
    state: &AppState,
    update: ProfileUpdate,
) -> CommandResult<PremisesProfile> {
    let profile = state.store.update(update).map_err(to_response)?;
    state.reset_sessions().await;
    tracing::info!("Profile '{}' updated", profile.nombre_local);
    Ok(profile)
}

/// Forget the registered premises
pub async fn clear_profile(state: &AppState) -> CommandResult<()> {
    state.store.clear().map_err(to_response)?;
    state.reset_sessions().await;
    Ok(())
}

/// Whether a premises name is already registered
pub async fn check_local_exists(state: &AppState, name: String) -> CommandResult<bool> {
    Ok(backend::check_local_exists(state.client.as_ref(), &state.config.api_base_url, &name).await)
}

/// Parse a typed `"lat, lng"` pair into coordinates and a fallback address label
pub fn resolve_location(input: &str) -> CommandResult<(f64, f64, String)> {
    let (lat, lng) = parse_coordinate_string(input).ok_or_else(|| {
        ErrorResponse::from(AppError::Registration("Coordenadas inválidas".to_string()))
    })?;
    Ok((lat, lng, approximate_label(lat, lng)))
}
