use crate::config::ControllerConfig;
use crate::controller::{Command, PlayOutcome, PlayReply, Step};
use crate::error::{PlaybackError, Result};
use playdeck_core::{PlaybackStatus, PlayerSnapshot, Queue, Track, TrackId};
use playdeck_providers::{
    AudioResource, AudioResourceProvider, LoadOptions, PlayEventRecorder, StatusCallback,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

enum Event {
    LoadFinished {
        token: u64,
        track: Arc<Track>,
        result: Result<Box<dyn AudioResource>>,
        reply: Option<PlayReply>,
    },
    Status {
        token: u64,
        track: Arc<Track>,
        status: PlaybackStatus,
    },
    AdvanceDue {
        token: u64,
        next: Arc<Track>,
    },
}

struct ActiveResource {
    /// Load token of the request that produced this resource.
    token: u64,
    resource: Box<dyn AudioResource>,
}

/// Owns all playback state. Runs until shutdown or until every handle is dropped.
pub(crate) struct Runner {
    provider: Arc<dyn AudioResourceProvider>,
    recorder: Arc<dyn PlayEventRecorder>,
    cfg: ControllerConfig,
    commands: mpsc::Receiver<Command>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    state_tx: watch::Sender<PlayerSnapshot>,

    current_track: Option<Arc<Track>>,
    active: Option<ActiveResource>,
    is_playing: bool,
    load_token: u64,
    queue: Queue,
    position_ms: u64,
    duration_ms: Option<u64>,
}

impl Runner {
    pub(crate) fn new(
        provider: Arc<dyn AudioResourceProvider>,
        recorder: Arc<dyn PlayEventRecorder>,
        cfg: ControllerConfig,
        commands: mpsc::Receiver<Command>,
        state_tx: watch::Sender<PlayerSnapshot>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            recorder,
            cfg,
            commands,
            events_tx,
            events_rx,
            state_tx,
            current_track: None,
            active: None,
            is_playing: false,
            load_token: 0,
            queue: Queue::default(),
            position_ms: 0,
            duration_ms: None,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(provider = self.provider.name(), "playback runner starting");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd).await {
                                break;
                            }
                        }
                        None => {
                            self.stop();
                            break;
                        }
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event).await;
                }
            }
        }

        debug!("playback runner stopped");
    }

    /// Returns `true` when the runner should exit.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::PlayTrack { track, reply } => {
                self.play_track(track, Some(reply)).await;
            }
            Command::Step { step, reply } => {
                let neighbour = self.current_track.as_ref().and_then(|current| match step {
                    Step::Next => self.queue.next_after(&current.id).cloned(),
                    Step::Previous => self.queue.previous_before(&current.id).cloned(),
                });
                match neighbour {
                    Some(track) => {
                        let (load_tx, load_rx) = oneshot::channel();
                        let _ = reply.send(Some(load_rx));
                        self.play_track(track, Some(load_tx)).await;
                    }
                    None => {
                        debug!(?step, "no neighbouring track in queue");
                        let _ = reply.send(None);
                    }
                }
            }
            Command::SetPlaying { playing, reply } => {
                self.set_playing(playing).await;
                let _ = reply.send(());
            }
            Command::Seek { position, reply } => {
                self.seek(position).await;
                let _ = reply.send(());
            }
            Command::ChangePlaylist {
                tracks,
                source,
                reply,
            } => {
                debug!(len = tracks.len(), source = %source, "queue replaced");
                self.queue = Queue::new(tracks, source);
                self.publish();
                let _ = reply.send(());
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                self.stop();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::LoadFinished {
                token,
                track,
                result,
                reply,
            } => self.finish_load(token, track, result, reply),
            Event::Status {
                token,
                track,
                status,
            } => self.on_status(token, track, status),
            Event::AdvanceDue { token, next } => {
                if token == self.load_token {
                    info!(track_id = %next.id, "advancing to next track");
                    self.play_track(next, None).await;
                } else {
                    debug!(track_id = %next.id, "auto-advance overtaken by a newer request");
                }
            }
        }
    }

    async fn play_track(&mut self, track: Arc<Track>, reply: Option<PlayReply>) {
        if self.is_current(&track.id) && self.active.is_some() {
            let playing = !self.is_playing;
            self.set_playing(playing).await;
            send_reply(reply, Ok(PlayOutcome::Toggled { is_playing: playing }));
            return;
        }

        self.load_token += 1;
        let token = self.load_token;
        self.release_active();

        self.current_track = Some(track.clone());
        self.position_ms = 0;
        self.duration_ms = track.duration_ms;
        self.publish();

        debug!(track_id = %track.id, token, "loading track");
        self.spawn_load(token, track, reply);
    }

    fn spawn_load(&self, token: u64, track: Arc<Track>, reply: Option<PlayReply>) {
        let provider = self.provider.clone();
        let events = self.events_tx.clone();
        let on_status = status_callback(events.clone(), token, track.clone());
        let options = LoadOptions {
            autoplay: self.cfg.autoplay,
        };
        let timeout = self.cfg.load_timeout;

        tokio::spawn(async move {
            let load = provider.load(&track.stream_uri, options, on_status);
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, load).await {
                    Ok(loaded) => loaded.map_err(|source| PlaybackError::Load {
                        track_id: track.id.clone(),
                        source,
                    }),
                    Err(_) => Err(PlaybackError::LoadTimedOut {
                        track_id: track.id.clone(),
                        timeout: limit,
                    }),
                },
                None => load.await.map_err(|source| PlaybackError::Load {
                    track_id: track.id.clone(),
                    source,
                }),
            };

            let finished = Event::LoadFinished {
                token,
                track,
                result,
                reply,
            };
            if let Err(mpsc::error::SendError(Event::LoadFinished {
                result: Ok(orphan), ..
            })) = events.send(finished)
            {
                let _ = orphan.unload().await;
            }
        });
    }

    fn finish_load(
        &mut self,
        token: u64,
        track: Arc<Track>,
        result: Result<Box<dyn AudioResource>>,
        reply: Option<PlayReply>,
    ) {
        if token != self.load_token {
            match result {
                Ok(resource) => {
                    debug!(track_id = %track.id, token, "discarding superseded load");
                    unload_detached(Some(track.id.clone()), resource);
                }
                Err(err) => {
                    debug!(track_id = %track.id, token, error = %err, "superseded load failed");
                }
            }
            send_reply(reply, Ok(PlayOutcome::Superseded));
            return;
        }

        match result {
            Ok(resource) => {
                self.active = Some(ActiveResource { token, resource });
                self.is_playing = self.cfg.autoplay;
                self.publish();
                info!(track_id = %track.id, title = %track.title, "playback started");
                self.record_play(&track.id);
                send_reply(reply, Ok(PlayOutcome::Started));
            }
            Err(err) => {
                warn!(track_id = %track.id, error = %err, "track failed to load");
                self.is_playing = false;
                self.publish();
                send_reply(reply, Err(err));
            }
        }
    }

    fn on_status(&mut self, token: u64, track: Arc<Track>, status: PlaybackStatus) {
        let from_active = self.active.as_ref().map(|a| a.token) == Some(token);
        if token != self.load_token || !from_active {
            return;
        }

        self.position_ms = status.position_ms;
        if status.duration_ms.is_some() {
            self.duration_ms = status.duration_ms;
        }

        if status.just_finished {
            self.is_playing = false;
            match self.queue.next_after(&track.id).cloned() {
                Some(next) => self.schedule_advance(token, next),
                None => info!(track_id = %track.id, "reached end of queue"),
            }
        }
        self.publish();
    }

    fn schedule_advance(&self, token: u64, next: Arc<Track>) {
        let events = self.events_tx.clone();
        let delay = self.cfg.advance_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::AdvanceDue { token, next });
        });
    }

    async fn set_playing(&mut self, playing: bool) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if let Err(err) = active.resource.set_playing(playing).await {
            warn!(playing, error = %err, "audio backend rejected play/pause");
        }
        self.is_playing = playing;
        self.publish();
    }

    async fn seek(&mut self, position: Duration) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if let Err(err) = active.resource.seek(position).await {
            warn!(position_ms = position.as_millis() as u64, error = %err, "seek failed");
            return;
        }
        self.position_ms = position.as_millis() as u64;
        self.publish();
    }

    fn stop(&mut self) {
        self.load_token += 1;
        self.release_active();
        self.publish();
    }

    fn release_active(&mut self) {
        if let Some(active) = self.active.take() {
            let track_id = self.current_track.as_ref().map(|t| t.id.clone());
            debug!(token = active.token, "releasing active resource");
            unload_detached(track_id, active.resource);
        }
        self.is_playing = false;
    }

    fn record_play(&self, track_id: &TrackId) {
        let recorder = self.recorder.clone();
        let track_id = track_id.clone();
        tokio::spawn(async move {
            if let Err(err) = recorder.record(&track_id).await {
                warn!(track_id = %track_id, error = %err, "failed to record play event");
            }
        });
    }

    fn is_current(&self, id: &TrackId) -> bool {
        self.current_track.as_ref().is_some_and(|t| &t.id == id)
    }

    fn publish(&self) {
        self.state_tx.send_replace(PlayerSnapshot {
            current_track: self.current_track.clone(),
            is_playing: self.is_playing,
            queue: self.queue.clone(),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
        });
    }
}

fn status_callback(
    events: mpsc::UnboundedSender<Event>,
    token: u64,
    track: Arc<Track>,
) -> StatusCallback {
    Arc::new(move |status| {
        let _ = events.send(Event::Status {
            token,
            track: track.clone(),
            status,
        });
    })
}

/// The runner never awaits an unload.
fn unload_detached(track_id: Option<TrackId>, resource: Box<dyn AudioResource>) {
    tokio::spawn(async move {
        if let Err(err) = resource.unload().await {
            warn!(track_id = ?track_id, error = %err, "failed to unload audio resource");
        }
    });
}

fn send_reply(reply: Option<PlayReply>, result: Result<PlayOutcome>) {
    if let Some(reply) = reply {
        let _ = reply.send(result);
    }
}
