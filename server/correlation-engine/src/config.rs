//! Pipeline configuration with sane defaults.

use std::time::Duration;

use tracing::warn;

/// Tunable thresholds for windowing, backpressure and delivery.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Buffered record count that closes a window.
  pub flush_threshold: usize,
  /// Elapsed time since the last flush that closes a window.
  pub window: Duration,
  /// Hard ceiling on buffered records; `None` = unbounded.
  pub max_buffered: Option<usize>,
  /// Per-subscriber queue depth before bundles are dropped for that subscriber.
  pub subscriber_capacity: usize,
  /// Sleep between reads when a tailed file is at EOF.
  pub tail_poll_interval: Duration,
  /// Period of the background flush checker.
  pub flush_check_interval: Duration,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      flush_threshold: 100,
      window: Duration::from_secs(10),
      max_buffered: Some(10_000),
      subscriber_capacity: 16,
      tail_poll_interval: Duration::from_secs(1),
      flush_check_interval: Duration::from_secs(1),
    }
  }
}

impl PipelineConfig {
  /// Defaults overridden by `LOGCORR_*` environment variables.
  ///
  /// Unparseable values are ignored with a warning.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let mut config = Self::default();
    if let Some(n) = parse_var::<usize>(&lookup, "LOGCORR_FLUSH_THRESHOLD") {
      config.flush_threshold = n.max(1);
    }
    if let Some(secs) = parse_var::<u64>(&lookup, "LOGCORR_WINDOW_SECS") {
      config.window = Duration::from_secs(secs);
    }
    if let Some(n) = parse_var::<usize>(&lookup, "LOGCORR_MAX_BUFFERED") {
      config.max_buffered = if n == 0 { None } else { Some(n) };
    }
    if let Some(n) = parse_var::<usize>(&lookup, "LOGCORR_SUBSCRIBER_CAPACITY") {
      config.subscriber_capacity = n.max(1);
    }
    config
  }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
  let raw = lookup(key)?;
  match raw.trim().parse() {
    Ok(v) => Some(v),
    Err(_) => {
      warn!(key, value = %raw, "ignoring invalid config value");
      None
    }
  }
}
