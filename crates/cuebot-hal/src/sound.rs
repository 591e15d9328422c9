//! Async `SoundOutput` trait for speech, tones, and stock clips.
//!
//! Every method resolves only once playback has finished, so an action that
//! awaits a clip naturally waits for its duration without blocking the
//! executor.

use std::time::Duration;

use async_trait::async_trait;
use cuebot_types::CueError;

#[async_trait]
pub trait SoundOutput: Send + Sync {
    /// Synthesize and play `text`.
    async fn play_speech(&self, text: &str) -> Result<(), CueError>;

    /// Play a sine tone of `freq_hz` for `duration`.
    async fn play_tone(&self, freq_hz: f32, duration: Duration) -> Result<(), CueError>;

    /// Play the start-up chime clip.
    async fn play_init_chime(&self) -> Result<(), CueError>;
}
