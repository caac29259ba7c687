use playdeck_core::TrackId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The audio backend could not open or decode the stream.
    #[error("failed to load track {track_id}: {source}")]
    Load {
        track_id: TrackId,
        #[source]
        source: anyhow::Error,
    },

    #[error("loading track {track_id} did not finish within {timeout:?}")]
    LoadTimedOut { track_id: TrackId, timeout: Duration },

    /// The runner task is gone.
    #[error("playback controller is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
