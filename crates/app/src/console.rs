use anyhow::{bail, Context, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelector {
    /// 1-based position in the queue.
    Position(usize),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Play(TrackSelector),
    Pause,
    Resume,
    Next,
    Prev,
    Stop,
    Seek(Duration),
    Status,
    Queue,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play <n|id>   play queue position n (1-based) or the track with that id
  pause         pause playback
  resume        resume playback
  next | prev   move through the queue
  seek <secs>   jump within the current track
  stop          stop playback
  status        show the current track
  queue         list the queue
  quit          exit";

/// Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();
    if parts.next().is_some() {
        bail!("too many arguments for {word:?}");
    }

    let cmd = match (word.to_ascii_lowercase().as_str(), arg) {
        ("play" | "p", Some(target)) => ConsoleCommand::Play(selector(target)),
        ("play" | "p", None) => bail!("usage: play <n|id>"),
        ("pause", None) => ConsoleCommand::Pause,
        ("resume" | "r", None) => ConsoleCommand::Resume,
        ("next" | "n", None) => ConsoleCommand::Next,
        ("prev" | "previous", None) => ConsoleCommand::Prev,
        ("stop", None) => ConsoleCommand::Stop,
        ("seek", Some(secs)) => {
            let secs: f64 = secs
                .parse()
                .with_context(|| format!("invalid seek position {secs:?}"))?;
            if !secs.is_finite() || secs < 0.0 {
                bail!("seek position must be a non-negative number of seconds");
            }
            ConsoleCommand::Seek(Duration::from_secs_f64(secs))
        }
        ("seek", None) => bail!("usage: seek <secs>"),
        ("status" | "s", None) => ConsoleCommand::Status,
        ("queue" | "q", None) => ConsoleCommand::Queue,
        ("help" | "?", None) => ConsoleCommand::Help,
        ("quit" | "exit", None) => ConsoleCommand::Quit,
        (other, Some(_)) if is_known(other) => bail!("{other:?} takes no argument"),
        (other, _) => bail!("unknown command {other:?}; type help"),
    };
    Ok(Some(cmd))
}

fn selector(target: &str) -> TrackSelector {
    match target.parse::<usize>() {
        Ok(n) if n > 0 => TrackSelector::Position(n),
        _ => TrackSelector::Id(target.to_string()),
    }
}

fn is_known(word: &str) -> bool {
    matches!(
        word,
        "pause"
            | "resume"
            | "r"
            | "next"
            | "n"
            | "prev"
            | "previous"
            | "stop"
            | "status"
            | "s"
            | "queue"
            | "q"
            | "help"
            | "?"
            | "quit"
            | "exit"
    )
}

pub fn format_ms(ms: u64) -> String {
    let secs = ms / 1_000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::{format_ms, parse, ConsoleCommand, TrackSelector};
    use std::time::Duration;

    #[test]
    fn parses_play_targets() {
        assert_eq!(
            parse("play 3").unwrap(),
            Some(ConsoleCommand::Play(TrackSelector::Position(3)))
        );
        assert_eq!(
            parse("p song-42").unwrap(),
            Some(ConsoleCommand::Play(TrackSelector::Id("song-42".to_string())))
        );
        assert_eq!(
            parse("play 0").unwrap(),
            Some(ConsoleCommand::Play(TrackSelector::Id("0".to_string())))
        );
    }

    #[test]
    fn parses_simple_commands_case_insensitively() {
        assert_eq!(parse("  PAUSE ").unwrap(), Some(ConsoleCommand::Pause));
        assert_eq!(parse("next").unwrap(), Some(ConsoleCommand::Next));
        assert_eq!(parse("prev").unwrap(), Some(ConsoleCommand::Prev));
        assert_eq!(parse("quit").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn parses_seek_seconds() {
        assert_eq!(
            parse("seek 1.5").unwrap(),
            Some(ConsoleCommand::Seek(Duration::from_millis(1_500)))
        );
        assert!(parse("seek -2").is_err());
        assert!(parse("seek soon").is_err());
        assert!(parse("seek").is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("play").is_err());
        assert!(parse("pause now").is_err());
        assert!(parse("dance").is_err());
        assert!(parse("play 1 2").is_err());
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_ms(0), "0:00");
        assert_eq!(format_ms(65_400), "1:05");
        assert_eq!(format_ms(600_000), "10:00");
    }
}
