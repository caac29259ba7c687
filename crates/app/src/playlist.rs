use anyhow::{bail, Context, Result};
use playdeck_core::Track;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistFile {
    pub source: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl PlaylistFile {
    pub fn shared_tracks(&self) -> Vec<Arc<Track>> {
        self.tracks.iter().cloned().map(Arc::new).collect()
    }
}

pub fn load(path: &Path) -> Result<PlaylistFile> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read playlist {}", path.display()))?;
    parse(&data).with_context(|| format!("failed to parse playlist {}", path.display()))
}

pub fn parse(data: &str) -> Result<PlaylistFile> {
    let playlist: PlaylistFile = toml::from_str(data)?;
    if playlist.tracks.is_empty() {
        bail!("playlist {:?} has no tracks", playlist.source);
    }

    let mut seen = HashSet::new();
    for track in &playlist.tracks {
        if !seen.insert(&track.id) {
            warn!(track_id = %track.id, "track listed more than once; lookups use the first entry");
        }
    }
    Ok(playlist)
}
