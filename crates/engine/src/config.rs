use playdeck_core::AppConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Pause between a track finishing and its successor being requested.
    pub advance_delay: Duration,
    /// Loads still pending after this long count as failed. `None` waits forever.
    pub load_timeout: Option<Duration>,
    pub autoplay: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(500),
            load_timeout: Some(Duration::from_secs(30)),
            autoplay: true,
        }
    }
}

impl ControllerConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            advance_delay: Duration::from_millis(cfg.playback.advance_delay_ms),
            load_timeout: cfg.playback.load_timeout_ms.map(Duration::from_millis),
            autoplay: cfg.playback.autoplay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ControllerConfig;
    use playdeck_core::AppConfig;
    use std::time::Duration;

    #[test]
    fn maps_app_config_durations() {
        let mut app = AppConfig::default();
        app.playback.advance_delay_ms = 120;
        app.playback.load_timeout_ms = None;

        let cfg = ControllerConfig::from_app_config(&app);
        assert_eq!(cfg.advance_delay, Duration::from_millis(120));
        assert!(cfg.load_timeout.is_none());
        assert!(cfg.autoplay);
    }
}
