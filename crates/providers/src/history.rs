use crate::PlayEventRecorder;
use anyhow::{Context, Result};
use async_trait::async_trait;
use playdeck_core::TrackId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayRecord {
    pub track_id: TrackId,
    pub played_at_ms: u64,
}

/// Appends one JSON line per playback start to a local "recently played" log.
pub struct PlayHistoryRecorder {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PlayHistoryRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl PlayEventRecorder for PlayHistoryRecorder {
    async fn record(&self, track_id: &TrackId) -> Result<()> {
        let played_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before unix epoch")?
            .as_millis() as u64;
        let mut line = serde_json::to_string(&PlayRecord {
            track_id: track_id.clone(),
            played_at_ms,
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

/// Most recent plays, newest first, one entry per track.
pub async fn read_recent(path: &Path, limit: usize) -> Result<Vec<PlayRecord>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };

    let mut seen = HashSet::new();
    let mut recent = Vec::new();
    let lines: Vec<&str> = data.lines().collect();
    for (lineno, line) in lines.into_iter().enumerate().rev() {
        if line.trim().is_empty() {
            continue;
        }
        let record: PlayRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(err) => {
                warn!(line = lineno + 1, error = %err, "skipping malformed history entry");
                continue;
            }
        };
        if seen.insert(record.track_id.clone()) {
            recent.push(record);
            if recent.len() >= limit {
                break;
            }
        }
    }
    Ok(recent)
}
