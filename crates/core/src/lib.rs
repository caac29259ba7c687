pub mod config;
pub mod model;
pub mod queue;

pub use config::{AppConfig, HistoryConfig, PlaybackSettings, SimulationConfig};
pub use model::{PlaybackStatus, PlayerSnapshot, Track, TrackId};
pub use queue::Queue;
