use crate::{AudioResource, AudioResourceProvider, LoadOptions, StatusCallback};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use playdeck_core::{PlaybackStatus, SimulationConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

const DEFAULT_DURATION_MS: u64 = 180_000;

/// What a `sim://` URI asks the simulated backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSpec {
    pub duration: Duration,
    pub latency: Duration,
}

impl SimSpec {
    /// `sim://<name>?duration_ms=..&latency_ms=..`; the host `fail` always fails.
    pub fn parse(uri: &str, default_latency: Duration) -> Result<Self> {
        let url = Url::parse(uri).with_context(|| format!("invalid stream uri {uri}"))?;
        if url.scheme() != "sim" {
            bail!("unsupported stream scheme {:?}", url.scheme());
        }
        if url.host_str() == Some("fail") {
            bail!("stream {uri} cannot be decoded");
        }

        let mut spec = SimSpec {
            duration: Duration::from_millis(DEFAULT_DURATION_MS),
            latency: default_latency,
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "duration_ms" => {
                    let ms: u64 = value
                        .parse()
                        .with_context(|| format!("bad duration_ms {value:?}"))?;
                    spec.duration = Duration::from_millis(ms);
                }
                "latency_ms" => {
                    let ms: u64 = value
                        .parse()
                        .with_context(|| format!("bad latency_ms {value:?}"))?;
                    spec.latency = Duration::from_millis(ms);
                }
                _ => {}
            }
        }
        Ok(spec)
    }
}

/// In-process stand-in for a platform audio backend.
pub struct SimulatedProvider {
    tick_interval: Duration,
    default_latency: Duration,
}

impl SimulatedProvider {
    pub fn new(tick_interval: Duration, default_latency: Duration) -> Self {
        Self {
            tick_interval: tick_interval.max(Duration::from_millis(10)),
            default_latency,
        }
    }

    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.tick_interval_ms),
            Duration::from_millis(cfg.default_latency_ms),
        )
    }
}

#[async_trait]
impl AudioResourceProvider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn load(
        &self,
        uri: &str,
        options: LoadOptions,
        on_status: StatusCallback,
    ) -> Result<Box<dyn AudioResource>> {
        let spec = SimSpec::parse(uri, self.default_latency)?;
        tokio::time::sleep(spec.latency).await;
        debug!(uri, duration_ms = spec.duration.as_millis() as u64, "simulated stream loaded");
        Ok(Box::new(SimResource::start(
            spec,
            options,
            self.tick_interval,
            on_status,
        )))
    }
}

#[derive(Debug)]
struct SimState {
    playing: bool,
    finished: bool,
    unloaded: bool,
    position: Duration,
    duration: Duration,
}

impl SimState {
    fn status(&self, just_finished: bool) -> PlaybackStatus {
        PlaybackStatus {
            is_loaded: !self.unloaded,
            is_playing: self.playing,
            just_finished,
            position_ms: self.position.as_millis() as u64,
            duration_ms: Some(self.duration.as_millis() as u64),
        }
    }
}

struct SimResource {
    state: Arc<Mutex<SimState>>,
    ticker: JoinHandle<()>,
}

impl SimResource {
    fn start(
        spec: SimSpec,
        options: LoadOptions,
        tick: Duration,
        on_status: StatusCallback,
    ) -> Self {
        let state = Arc::new(Mutex::new(SimState {
            playing: options.autoplay,
            finished: false,
            unloaded: false,
            position: Duration::ZERO,
            duration: spec.duration,
        }));

        let shared = state.clone();
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let status = {
                    let Ok(mut st) = shared.lock() else { break };
                    if st.unloaded {
                        break;
                    }
                    let mut just_finished = false;
                    if st.playing {
                        st.position = (st.position + tick).min(st.duration);
                        if st.position >= st.duration {
                            st.playing = false;
                            st.finished = true;
                            just_finished = true;
                        }
                    }
                    st.status(just_finished)
                };
                on_status(status);
            }
        });

        Self { state, ticker }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SimState) -> Result<T>) -> Result<T> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("simulated stream state poisoned"))?;
        if st.unloaded {
            bail!("stream already unloaded");
        }
        f(&mut *st)
    }
}

#[async_trait]
impl AudioResource for SimResource {
    async fn set_playing(&self, playing: bool) -> Result<()> {
        self.with_state(|st| {
            if playing && st.finished {
                st.finished = false;
                st.position = Duration::ZERO;
            }
            st.playing = playing;
            Ok(())
        })
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.with_state(|st| {
            st.position = position.min(st.duration);
            Ok(())
        })
    }

    async fn unload(&self) -> Result<()> {
        if let Ok(mut st) = self.state.lock() {
            st.unloaded = true;
            st.playing = false;
        }
        self.ticker.abort();
        Ok(())
    }
}

impl Drop for SimResource {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::{SimSpec, SimulatedProvider};
    use crate::{AudioResource, AudioResourceProvider, LoadOptions, StatusCallback};
    use playdeck_core::PlaybackStatus;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn collector() -> (StatusCallback, Arc<Mutex<Vec<PlaybackStatus>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: StatusCallback = Arc::new(move |s| sink.lock().unwrap().push(s));
        (cb, seen)
    }

    #[test]
    fn parses_query_parameters() {
        let spec = SimSpec::parse(
            "sim://song?duration_ms=4000&latency_ms=20",
            Duration::from_millis(150),
        )
        .unwrap();
        assert_eq!(spec.duration, Duration::from_millis(4_000));
        assert_eq!(spec.latency, Duration::from_millis(20));
    }

    #[test]
    fn falls_back_to_defaults() {
        let spec = SimSpec::parse("sim://song", Duration::from_millis(75)).unwrap();
        assert_eq!(spec.duration, Duration::from_secs(180));
        assert_eq!(spec.latency, Duration::from_millis(75));
    }

    #[test]
    fn rejects_foreign_and_failing_uris() {
        assert!(SimSpec::parse("https://cdn.example.com/a.mp3", Duration::ZERO).is_err());
        assert!(SimSpec::parse("sim://fail", Duration::ZERO).is_err());
        assert!(SimSpec::parse("not a uri", Duration::ZERO).is_err());
        assert!(SimSpec::parse("sim://x?duration_ms=soon", Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn plays_to_the_end_and_reports_finish_once() {
        let provider = SimulatedProvider::new(Duration::from_millis(10), Duration::ZERO);
        let (cb, seen) = collector();
        let resource = provider
            .load("sim://short?duration_ms=30", LoadOptions::default(), cb)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        resource.unload().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.iter().filter(|s| s.just_finished).count(), 1);
        let last = seen.last().unwrap();
        assert!(!last.is_playing);
        assert_eq!(last.position_ms, 30);
    }

    #[tokio::test]
    async fn paused_stream_does_not_advance() {
        let provider = SimulatedProvider::new(Duration::from_millis(10), Duration::ZERO);
        let (cb, seen) = collector();
        let resource = provider
            .load(
                "sim://paused?duration_ms=1000",
                LoadOptions { autoplay: false },
                cb,
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        resource.unload().await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|s| s.position_ms == 0 && !s.is_playing));
    }

    #[tokio::test]
    async fn unloaded_stream_refuses_commands() {
        let provider = SimulatedProvider::new(Duration::from_millis(10), Duration::ZERO);
        let (cb, _seen) = collector();
        let resource = provider
            .load("sim://gone", LoadOptions::default(), cb)
            .await
            .unwrap();

        resource.unload().await.unwrap();
        assert!(resource.set_playing(true).await.is_err());
        assert!(resource.seek(Duration::from_secs(1)).await.is_err());
        assert!(resource.unload().await.is_ok());
    }
}
