//! Camera feed, audio and master switch commands

use super::{to_response, AppState, CommandResult};
use crate::streaming::{
    AudioState, ConnectivityReport, SwitchState, SwitchStatus, VideoQuality, VideoState,
};

/// Probe the registered camera
pub async fn test_camera_connectivity(state: &AppState) -> CommandResult<ConnectivityReport> {
    let pipeline = state.pipeline().await?;
    Ok(pipeline.video.test_connectivity().await)
}

/// Start the camera feed outside of the master switch
pub async fn start_video(state: &AppState) -> CommandResult<VideoState> {
    let pipeline = state.pipeline().await?;
    pipeline.video.start().await.map_err(to_response)?;
    Ok(pipeline.video.state())
}

pub async fn stop_video(state: &AppState) -> CommandResult<VideoState> {
    let pipeline = state.pipeline().await?;
    pipeline.video.stop();
    Ok(pipeline.video.state())
}

pub async fn reconnect_video(state: &AppState) -> CommandResult<VideoState> {
    let pipeline = state.pipeline().await?;
    pipeline.video.reconnect().await.map_err(to_response)?;
    Ok(pipeline.video.state())
}

/// Select a feed quality by name; unknown names fall back to HD
pub async fn change_video_quality(state: &AppState, quality: String) -> CommandResult<VideoState> {
    let pipeline = state.pipeline().await?;
    pipeline.video.change_quality(VideoQuality::parse(&quality));
    Ok(pipeline.video.state())
}

pub async fn get_video_state(state: &AppState) -> CommandResult<VideoState> {
    Ok(state.pipeline().await?.video.state())
}

pub async fn get_audio_state(state: &AppState) -> CommandResult<AudioState> {
    Ok(state.pipeline().await?.audio.state())
}

/// Resolve the initial switch status
pub async fn fetch_switch_status(state: &AppState) -> CommandResult<SwitchStatus> {
    let pipeline = state.pipeline().await?;
    pipeline.switch.fetch_status().await.map_err(to_response)
}

pub async fn get_switch_state(state: &AppState) -> CommandResult<SwitchState> {
    Ok(state.pipeline().await?.switch.state())
}

/// Turn the detection pipeline on
pub async fn activate_kuntur(state: &AppState) -> CommandResult<SwitchState> {
    let pipeline = state.pipeline().await?;
    pipeline.switch.activate().await.map_err(to_response)?;
    Ok(pipeline.switch.state())
}

/// Turn the detection pipeline off
pub async fn deactivate_kuntur(state: &AppState) -> CommandResult<SwitchState> {
    let pipeline = state.pipeline().await?;
    pipeline.switch.deactivate().await.map_err(to_response)?;
    Ok(pipeline.switch.state())
}

pub async fn toggle_kuntur(state: &AppState) -> CommandResult<SwitchState> {
    let pipeline = state.pipeline().await?;
    pipeline.switch.toggle().await.map_err(to_response)?;
    Ok(pipeline.switch.state())
}
