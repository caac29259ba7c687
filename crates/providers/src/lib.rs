use anyhow::Result;
use async_trait::async_trait;
use playdeck_core::{PlaybackStatus, TrackId};
use std::sync::Arc;
use std::time::Duration;

mod history;
mod simulated;

pub use history::{read_recent, PlayHistoryRecorder, PlayRecord};
pub use simulated::{SimSpec, SimulatedProvider};

/// Receives status ticks from a loaded resource. May keep firing after the
/// controller has moved on to another track.
pub type StatusCallback = Arc<dyn Fn(PlaybackStatus) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub autoplay: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { autoplay: true }
    }
}

/// A loaded, decodable audio stream. Every call is best-effort.
#[async_trait]
pub trait AudioResource: Send + Sync {
    async fn set_playing(&self, playing: bool) -> Result<()>;
    async fn seek(&self, position: Duration) -> Result<()>;
    async fn unload(&self) -> Result<()>;
}

#[async_trait]
pub trait AudioResourceProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(
        &self,
        uri: &str,
        options: LoadOptions,
        on_status: StatusCallback,
    ) -> Result<Box<dyn AudioResource>>;
}

/// Side channel told about every successful playback start.
#[async_trait]
pub trait PlayEventRecorder: Send + Sync {
    async fn record(&self, track_id: &TrackId) -> Result<()>;
}

pub struct NullRecorder;

#[async_trait]
impl PlayEventRecorder for NullRecorder {
    async fn record(&self, _track_id: &TrackId) -> Result<()> {
        Ok(())
    }
}
