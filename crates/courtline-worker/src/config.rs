//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of inference workers
    pub worker_count: usize,
    /// Positions per classification window
    pub bounce_window: usize,
    /// Probability above which a bounce is declared
    pub bounce_threshold: f32,
    /// Frames kept per stream for replay
    pub replay_buffer_frames: usize,
    /// Detector label treated as the ball
    pub ball_class: String,
    /// Decisions buffered between workers and the fan-out task
    pub fanout_buffer: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            bounce_window: 8,
            bounce_threshold: 0.5,
            replay_buffer_frames: 300, // 10s at 30fps
            ball_class: "ball".to_string(),
            fanout_buffer: 256,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_parse("WORKER_COUNT").unwrap_or(defaults.worker_count),
            bounce_window: env_parse("BOUNCE_WINDOW").unwrap_or(defaults.bounce_window),
            bounce_threshold: env_parse::<f32>("BOUNCE_THRESHOLD")
                .filter(|t| (0.0..=1.0).contains(t))
                .unwrap_or(defaults.bounce_threshold),
            replay_buffer_frames: env_parse("REPLAY_BUFFER_FRAMES")
                .unwrap_or(defaults.replay_buffer_frames),
            ball_class: std::env::var("BALL_CLASS").unwrap_or(defaults.ball_class),
            fanout_buffer: env_parse("FANOUT_BUFFER").unwrap_or(defaults.fanout_buffer),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        }
        .clamped()
    }

    /// Raise zero sizes to 1.
    pub fn clamped(mut self) -> Self {
        self.worker_count = self.worker_count.max(1);
        self.bounce_window = self.bounce_window.max(1);
        self.replay_buffer_frames = self.replay_buffer_frames.max(1);
        self.fanout_buffer = self.fanout_buffer.max(1);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
