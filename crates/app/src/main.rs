use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use playdeck_core::{AppConfig, PlaybackStatus, PlayerSnapshot, TrackId};
use playdeck_engine::{ControllerConfig, PlayOutcome, PlaybackController};
use playdeck_providers::{
    read_recent, AudioResource, AudioResourceProvider, LoadOptions, NullRecorder,
    PlayEventRecorder, PlayHistoryRecorder, SimulatedProvider, StatusCallback,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod console;
mod playlist;

use console::{format_ms, ConsoleCommand, TrackSelector};
use playlist::PlaylistFile;

const DOCTOR_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "playdeck", about = "Queue -> Playback controller -> Audio backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a playlist file interactively.
    Run { playlist: PathBuf },
    /// Check that every track in a playlist can be loaded.
    Doctor { playlist: PathBuf },
    /// Show recently played tracks.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg_path = cli.config.unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Config {
            action: ConfigAction::Init,
        } => {
            init_config(&cfg_path)?;
            println!("Initialized config at {}", cfg_path.display());
            Ok(())
        }
        Commands::Doctor { playlist } => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            doctor(&cfg, &playlist).await
        }
        Commands::History { limit } => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            history(&cfg, limit).await
        }
        Commands::Run { playlist } => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            run(cfg, &playlist).await
        }
    }
}

async fn run(cfg: AppConfig, playlist_path: &Path) -> Result<()> {
    let playlist = playlist::load(playlist_path)?;
    let provider = Arc::new(SimulatedProvider::from_config(&cfg.simulation));
    let controller = PlaybackController::spawn(
        provider,
        build_recorder(&cfg),
        ControllerConfig::from_app_config(&cfg),
    );
    controller
        .change_playlist(playlist.shared_tracks(), playlist.source.clone())
        .await?;

    info!(
        source = %playlist.source,
        tracks = playlist.tracks.len(),
        "playdeck started"
    );
    println!("{}", console::HELP);

    let mut updates = controller.subscribe();
    let mut last_seen: (Option<TrackId>, bool) = (None, false);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match console::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(cmd)) => execute(&controller, &playlist, cmd).await?,
                    Ok(None) => {}
                    Err(err) => println!("{err}"),
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                let seen = (snapshot.current_id().cloned(), snapshot.is_playing);
                if seen != last_seen {
                    print_now_playing(&snapshot);
                    last_seen = seen;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c; shutting down");
                break;
            }
        }
    }

    controller.shutdown().await?;
    Ok(())
}

async fn execute(
    controller: &PlaybackController,
    playlist: &PlaylistFile,
    cmd: ConsoleCommand,
) -> Result<()> {
    match cmd {
        ConsoleCommand::Play(selector) => {
            let queue = controller.snapshot().queue;
            let track = match &selector {
                TrackSelector::Position(n) => queue.get(n - 1).cloned(),
                TrackSelector::Id(id) => queue.find(&TrackId::new(id.as_str())).cloned(),
            };
            match track {
                Some(track) => {
                    let c = controller.clone();
                    tokio::spawn(async move { report(c.play_track(track).await.map(Some)) });
                }
                None => println!("no track {selector:?} in {:?}", playlist.source),
            }
        }
        ConsoleCommand::Next => {
            let c = controller.clone();
            tokio::spawn(async move { report(c.play_next_song().await) });
        }
        ConsoleCommand::Prev => {
            let c = controller.clone();
            tokio::spawn(async move { report(c.play_previous_song().await) });
        }
        ConsoleCommand::Pause => controller.pause_sound().await?,
        ConsoleCommand::Resume => controller.resume_sound().await?,
        ConsoleCommand::Stop => controller.stop_sound().await?,
        ConsoleCommand::Seek(position) => controller.seek_to(position).await?,
        ConsoleCommand::Status => print_status(&controller.snapshot()),
        ConsoleCommand::Queue => print_queue(&controller.snapshot()),
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn report(result: playdeck_engine::Result<Option<PlayOutcome>>) {
    match result {
        Ok(None) => println!("end of queue"),
        Ok(Some(PlayOutcome::Superseded)) => println!("skipped: a newer request took over"),
        Ok(Some(_)) => {}
        Err(err) => {
            warn!(error = %err, "playback request failed");
            println!("couldn't play this track: {err}");
        }
    }
}

fn print_now_playing(snapshot: &PlayerSnapshot) {
    match &snapshot.current_track {
        Some(track) => {
            let state = if snapshot.is_playing { "playing" } else { "paused" };
            println!("[{state}] {} - {}", track.artist, track.title);
        }
        None => println!("[stopped]"),
    }
}

fn print_status(snapshot: &PlayerSnapshot) {
    print_now_playing(snapshot);
    if snapshot.current_track.is_some() {
        let total = snapshot
            .duration_ms
            .map(format_ms)
            .unwrap_or_else(|| "?".to_string());
        println!("  {} / {}", format_ms(snapshot.position_ms), total);
    }
    println!("  queue: {} ({} tracks)", snapshot.queue_source(), snapshot.queue.len());
}

fn print_queue(snapshot: &PlayerSnapshot) {
    let current = snapshot.current_id();
    for (idx, track) in snapshot.queue.iter().enumerate() {
        let marker = if Some(&track.id) == current { ">" } else { " " };
        println!("{marker} {:>3}. {} - {} [{}]", idx + 1, track.artist, track.title, track.id);
    }
}

async fn doctor(cfg: &AppConfig, playlist_path: &Path) -> Result<()> {
    println!("== playdeck doctor ==");

    let playlist = playlist::load(playlist_path)?;
    let provider = SimulatedProvider::from_config(&cfg.simulation);
    println!("Audio backend: {}", provider.name());
    println!("Playlist: {} ({} tracks)", playlist.source, playlist.tracks.len());

    let silent: StatusCallback = Arc::new(|_: PlaybackStatus| {});
    let mut failures = 0;
    for track in &playlist.tracks {
        let load = provider.load(
            &track.stream_uri,
            LoadOptions { autoplay: false },
            silent.clone(),
        );
        match tokio::time::timeout(DOCTOR_LOAD_TIMEOUT, load).await {
            Ok(Ok(resource)) => {
                if let Err(err) = resource.unload().await {
                    println!("  ok   {} (unload failed: {err})", track.id);
                } else {
                    println!("  ok   {}", track.id);
                }
            }
            Ok(Err(err)) => {
                failures += 1;
                println!("  FAIL {}: {err:#}", track.id);
            }
            Err(_) => {
                failures += 1;
                println!("  FAIL {}: no response within {:?}", track.id, DOCTOR_LOAD_TIMEOUT);
            }
        }
    }

    println!(
        "History: {}",
        if cfg.history.enabled {
            history_path(cfg).display().to_string()
        } else {
            "disabled".to_string()
        }
    );

    if failures > 0 {
        println!("{failures} track(s) could not be loaded");
    }
    Ok(())
}

async fn history(cfg: &AppConfig, limit: usize) -> Result<()> {
    let path = history_path(cfg);
    let recent = read_recent(&path, limit).await?;
    if recent.is_empty() {
        println!("no plays recorded in {}", path.display());
        return Ok(());
    }
    for record in recent {
        println!("{}  {}", record.played_at_ms, record.track_id);
    }
    Ok(())
}

fn build_recorder(cfg: &AppConfig) -> Arc<dyn PlayEventRecorder> {
    if cfg.history.enabled {
        Arc::new(PlayHistoryRecorder::new(history_path(cfg)))
    } else {
        Arc::new(NullRecorder)
    }
}

fn history_path(cfg: &AppConfig) -> PathBuf {
    cfg.history.path.clone().unwrap_or_else(|| {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("playdeck").join("history.jsonl")
    })
}

fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("playdeck").join("config.toml")
}

fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let cfg = AppConfig::default();
    let toml = toml::to_string_pretty(&cfg)?;
    std::fs::write(path, toml)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

fn load_or_default(path: &Path) -> Result<AppConfig> {
    let mut cfg = if !path.exists() {
        AppConfig::default()
    } else {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("PLAYDECK_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.log_level = v;
        }
    }
    if let Ok(v) = std::env::var("PLAYDECK_HISTORY_ENABLED") {
        if let Ok(parsed) = v.parse::<bool>() {
            cfg.history.enabled = parsed;
        }
    }
    if let Ok(v) = std::env::var("PLAYDECK_ADVANCE_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            cfg.playback.advance_delay_ms = parsed;
        }
    }
}
