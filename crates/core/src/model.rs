use crate::queue::Queue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A playable unit. Metadata is carried for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub stream_uri: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// One tick reported by a loaded audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub just_finished: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

/// Read-only view of the controller, republished on every transition.
#[derive(Debug, Clone, Default)]
pub struct PlayerSnapshot {
    pub current_track: Option<Arc<Track>>,
    pub is_playing: bool,
    pub queue: Queue,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

impl PlayerSnapshot {
    pub fn current_id(&self) -> Option<&TrackId> {
        self.current_track.as_ref().map(|t| &t.id)
    }

    pub fn queue_source(&self) -> &str {
        self.queue.source()
    }
}
