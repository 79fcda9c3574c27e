//! Streaming sessions and the master switch
//!
//! The video session manages the camera feed shown to the user. The audio
//! session and the detection channel drive remote capture services, and the
//! master switch starts and stops them together.

mod audio;
mod channel;
mod detection;
mod state;
mod switch;
mod video;

pub use audio::AudioSession;
pub use channel::{Generation, PipelineChannel, SessionError, SessionResult};
pub use detection::DetectionChannel;
pub use state::{AudioState, SwitchState, SwitchStatus, VideoQuality, VideoState, VideoStatus};
pub use switch::{MasterSwitch, SwitchEvent};
pub use video::{ConnectivityReport, VideoSession, PROBE_ENDPOINTS};
