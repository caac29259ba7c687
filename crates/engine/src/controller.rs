use crate::config::ControllerConfig;
use crate::error::{PlaybackError, Result};
use crate::runner::Runner;
use playdeck_core::{PlayerSnapshot, Track};
use playdeck_providers::{AudioResourceProvider, PlayEventRecorder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// How a play request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The requested track is the active resource and is playing.
    Started,
    /// The track was already loaded, so the request flipped play/pause instead.
    Toggled { is_playing: bool },
    /// A newer request or a stop arrived before this load finished.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Next,
    Previous,
}

pub(crate) type PlayReply = oneshot::Sender<Result<PlayOutcome>>;

pub(crate) enum Command {
    PlayTrack {
        track: Arc<Track>,
        reply: PlayReply,
    },
    Step {
        step: Step,
        reply: oneshot::Sender<Option<oneshot::Receiver<Result<PlayOutcome>>>>,
    },
    SetPlaying {
        playing: bool,
        reply: oneshot::Sender<()>,
    },
    Seek {
        position: Duration,
        reply: oneshot::Sender<()>,
    },
    ChangePlaylist {
        tracks: Vec<Arc<Track>>,
        source: String,
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable handle to a running playback controller.
///
/// Every method resolves once the runner has applied the request, so the
/// snapshot read right after reflects it. `play_track` and the next/previous
/// helpers additionally wait for the load they started to settle.
#[derive(Clone)]
pub struct PlaybackController {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<PlayerSnapshot>,
}

impl PlaybackController {
    /// Spawns the runner on the current tokio runtime.
    pub fn spawn(
        provider: Arc<dyn AudioResourceProvider>,
        recorder: Arc<dyn PlayEventRecorder>,
        config: ControllerConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(PlayerSnapshot::default());

        let runner = Runner::new(provider, recorder, config, command_rx, state_tx);
        tokio::spawn(runner.run());

        Self {
            commands: command_tx,
            state: state_rx,
        }
    }

    /// Plays `track`, or toggles play/pause if it is already the loaded track.
    pub async fn play_track(&self, track: Arc<Track>) -> Result<PlayOutcome> {
        self.request(|reply| Command::PlayTrack { track, reply })
            .await?
    }

    pub async fn pause_sound(&self) -> Result<()> {
        self.request(|reply| Command::SetPlaying {
            playing: false,
            reply,
        })
        .await
    }

    pub async fn resume_sound(&self) -> Result<()> {
        self.request(|reply| Command::SetPlaying {
            playing: true,
            reply,
        })
        .await
    }

    /// `Ok(None)` when the current track is last in the queue or not in it.
    pub async fn play_next_song(&self) -> Result<Option<PlayOutcome>> {
        self.step(Step::Next).await
    }

    /// `Ok(None)` when the current track is first in the queue or not in it.
    pub async fn play_previous_song(&self) -> Result<Option<PlayOutcome>> {
        self.step(Step::Previous).await
    }

    pub async fn seek_to(&self, position: Duration) -> Result<()> {
        self.request(|reply| Command::Seek { position, reply })
            .await
    }

    /// Replaces queue and source tag together. Playback is untouched.
    pub async fn change_playlist(
        &self,
        tracks: Vec<Arc<Track>>,
        source: impl Into<String>,
    ) -> Result<()> {
        let source = source.into();
        self.request(|reply| Command::ChangePlaylist {
            tracks,
            source,
            reply,
        })
        .await
    }

    /// Unloads the active resource and cancels pending loads. Keeps the
    /// current track for display.
    pub async fn stop_sound(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Unloads everything and stops the runner. Other handles see `Closed` afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.state.clone()
    }

    async fn step(&self, step: Step) -> Result<Option<PlayOutcome>> {
        let pending = self.request(|reply| Command::Step { step, reply }).await?;
        match pending {
            Some(rx) => {
                let outcome = rx.await.map_err(|_| PlaybackError::Closed)??;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| PlaybackError::Closed)?;
        reply_rx.await.map_err(|_| PlaybackError::Closed)
    }
}
