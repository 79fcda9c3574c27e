//! Live event commands

use super::{AppState, CommandResult};
use crate::events::{AlertRecord, SubscriberStatus};
use crate::utils::error::AppError;

/// Open the live event channel
pub async fn open_live_events(state: &AppState) -> CommandResult<SubscriberStatus> {
    let subscriber = state.subscriber().await?;
    if let Err(e) = subscriber.open().await {
        tracing::warn!("Live events unavailable: {}", e);
    }
    Ok(subscriber.status())
}

/// Drop and re-open the live event channel
pub async fn reconnect_live_events(state: &AppState) -> CommandResult<SubscriberStatus> {
    let subscriber = state.subscriber().await?;
    if let Err(e) = subscriber.reconnect().await {
        tracing::warn!("Live event reconnect failed: {}", e);
    }
    Ok(subscriber.status())
}

pub async fn close_live_events(state: &AppState) -> CommandResult<()> {
    state.subscriber().await?.close().await;
    Ok(())
}

pub async fn get_live_status(state: &AppState) -> CommandResult<SubscriberStatus> {
    Ok(state.subscriber().await?.status())
}

pub async fn get_transcriptions(state: &AppState) -> CommandResult<Vec<String>> {
    Ok(state.subscriber().await?.transcriptions())
}

pub async fn get_alerts(state: &AppState) -> CommandResult<Vec<AlertRecord>> {
    Ok(state.subscriber().await?.alerts())
}

/// Empty one list (`transcriptions`, `alerts`) or both
pub async fn clear_live_events(state: &AppState, which: Option<String>) -> CommandResult<()> {
    let subscriber = state.subscriber().await?;
    match which.as_deref() {
        None => subscriber.clear(),
        Some("transcriptions") => subscriber.clear_transcriptions(),
        Some("alerts") => subscriber.clear_alerts(),
        Some(other) => {
            return Err(AppError::Config(crate::config::ConfigError::InvalidValue {
                key: "list",
                value: other.to_string(),
            })
            .into())
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::ScriptedClient;
    use crate::commands::testing;

    #[tokio::test]
    async fn test_lists_start_empty_and_clear_validates_name() {
        let (state, _, _dir) = testing::state(ScriptedClient::new());

        assert!(get_transcriptions(&state).await.unwrap().is_empty());
        assert!(get_alerts(&state).await.unwrap().is_empty());
        assert_eq!(get_live_status(&state).await.unwrap(), SubscriberStatus::Disconnected);

        clear_live_events(&state, Some("alerts".to_string())).await.unwrap();
        let err = clear_live_events(&state, Some("everything".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code, "CONFIG_ERROR");
    }
}
