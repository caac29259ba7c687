use crate::model::{Track, TrackId};
use std::sync::Arc;

/// Ordered tracks used for next/previous navigation, tagged with where they came from.
///
/// A queue is never edited in place; replacing it means building a new one, so
/// readers always see either the old list and tag or the new ones.
#[derive(Debug, Clone)]
pub struct Queue {
    tracks: Arc<[Arc<Track>]>,
    source: Arc<str>,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new(Vec::new(), "")
    }
}

impl Queue {
    pub fn new(tracks: Vec<Arc<Track>>, source: impl Into<String>) -> Self {
        Self {
            tracks: tracks.into(),
            source: Arc::from(source.into()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.tracks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Track>> {
        self.tracks.get(index)
    }

    /// First position holding a track with this id.
    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    pub fn next_after(&self, id: &TrackId) -> Option<&Arc<Track>> {
        let idx = self.position_of(id)?;
        self.tracks.get(idx + 1)
    }

    pub fn previous_before(&self, id: &TrackId) -> Option<&Arc<Track>> {
        let idx = self.position_of(id)?;
        idx.checked_sub(1).and_then(|prev| self.tracks.get(prev))
    }

    pub fn find(&self, id: &TrackId) -> Option<&Arc<Track>> {
        self.position_of(id).and_then(|idx| self.tracks.get(idx))
    }
}
