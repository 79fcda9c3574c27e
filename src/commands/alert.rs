//! Manual alert command

use super::{AppState, CommandResult};
use crate::backend::{self, ManualAlertOutcome};
use crate::utils::error::AppError;

/// Send a manual alert for the registered premises
pub async fn send_manual_alert(state: &AppState) -> CommandResult<ManualAlertOutcome> {
    let profile = state.store.load().map_err(AppError::from)?.ok_or(AppError::NotRegistered)?;

    tracing::info!("Manual alert requested for '{}'", profile.nombre_local);

    let outcome =
        backend::send_manual_alert(state.client.as_ref(), &state.config.alert_base_url, &profile)
            .await?;
    Ok(outcome)
}
