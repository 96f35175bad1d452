//! Pipeline: one window buffer plus one broadcast hub, shared by every
//! producer (HTTP pushes, file tails) and by the flush path.

use std::path::Path;
use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::{BufferStats, StreamManager};
use crate::bundle;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::hub::{BroadcastHub, SharedBundle, Subscription};
use crate::miner;
use crate::normalize;
use crate::tail::Tailer;
use crate::types::*;

/// Mine and assemble a closed window. Pure: touches no shared state.
pub fn assemble(records: Vec<LogRecord>) -> Result<CorrelationBundle, PipelineError> {
  let patterns = miner::mine(&records);
  bundle::build(records, patterns)
}

pub struct Pipeline {
  config: PipelineConfig,
  buffer: StreamManager,
  hub: BroadcastHub,
}

impl Pipeline {
  pub fn new(config: PipelineConfig) -> Self {
    Self {
      buffer: StreamManager::new(&config),
      hub: BroadcastHub::new(config.subscriber_capacity),
      config,
    }
  }

  pub fn hub(&self) -> &BroadcastHub {
    &self.hub
  }

  /// Normalize and buffer one raw entry. `false` = rejected (capacity).
  pub fn ingest(&self, raw: &RawEntry) -> bool {
    self.ingest_record(normalize::normalize(raw))
  }

  pub fn ingest_record(&self, record: LogRecord) -> bool {
    let accepted = self.buffer.ingest(record);
    if !accepted {
      debug!("buffer at capacity, record rejected");
    }
    accepted
  }

  pub fn should_flush(&self) -> bool {
    self.buffer.should_flush()
  }

  /// Detach the current window without publishing it.
  pub fn flush(&self) -> Option<Vec<LogRecord>> {
    self.buffer.flush()
  }

  /// Flush, assemble and publish. `Ok(None)` when the window was empty.
  pub fn flush_and_publish(&self) -> Result<Option<SharedBundle>, PipelineError> {
    let records = match self.buffer.flush() {
      Some(r) => r,
      None => return Ok(None),
    };
    let count = records.len();
    let bundle = Arc::new(assemble(records)?);
    let report = self.hub.publish(Arc::clone(&bundle));
    info!(
      records = count,
      patterns = bundle.log_patterns.len(),
      window_start = %bundle.window_start,
      window_end = %bundle.window_end,
      delivered = report.delivered,
      dropped = report.dropped,
      "window flushed"
    );
    Ok(Some(bundle))
  }

  /// Inline trigger for producers: flush only when a window has closed.
  pub fn maybe_flush(&self) -> Result<Option<SharedBundle>, PipelineError> {
    if self.should_flush() {
      self.flush_and_publish()
    } else {
      Ok(None)
    }
  }

  pub fn subscribe(&self) -> Subscription {
    self.hub.subscribe()
  }

  pub fn stats(&self) -> BufferStats {
    self.buffer.stats()
  }

  /// Periodically close time-expired windows until `cancel` fires.
  pub async fn run_flush_checker(&self, cancel: CancellationToken) {
    let mut interval = time::interval(self.config.flush_check_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = interval.tick() => {
          if let Err(e) = self.maybe_flush() {
            warn!(error = %e, "periodic flush failed");
          }
        }
      }
    }
    debug!("flush checker stopped");
  }

  /// Tail `path` into this pipeline until cancelled, checking the flush
  /// trigger after every record.
  pub async fn tail_file(
    &self,
    path: &Path,
    service: &str,
    cancel: &CancellationToken,
  ) -> Result<(), PipelineError> {
    let tailer = Tailer::open(path).await?;
    self.follow(tailer, service, cancel).await
  }

  /// Same as [`Pipeline::tail_file`] for a tail that is already open.
  pub async fn follow(
    &self,
    tailer: Tailer,
    service: &str,
    cancel: &CancellationToken,
  ) -> Result<(), PipelineError> {
    tailer
      .follow(service, self.config.tail_poll_interval, cancel, |record| {
        self.ingest_record(record);
        if let Err(e) = self.maybe_flush() {
          warn!(error = %e, "inline flush failed");
        }
      })
      .await
  }

  /// End every subscription. Buffered records are left in place.
  pub fn shutdown(&self) {
    self.hub.close();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn entry(ts: &str, level: &str, service: &str, message: &str) -> RawEntry {
    RawEntry::Fields(RawFields {
      timestamp: Some(ts.into()),
      level: Some(level.into()),
      service: Some(service.into()),
      message: Some(message.into()),
      ..RawFields::default()
    })
  }

  fn small_pipeline(threshold: usize) -> Pipeline {
    Pipeline::new(PipelineConfig {
      flush_threshold: threshold,
      window: Duration::from_secs(3600),
      flush_check_interval: Duration::from_millis(10),
      ..PipelineConfig::default()
    })
  }

  #[tokio::test]
  async fn threshold_flush_reaches_subscribers() {
    let pipeline = small_pipeline(2);
    let mut sub = pipeline.subscribe();

    assert!(pipeline.ingest(&entry("2025-01-15T10:00:01Z", "ERROR", "api", "boom")));
    assert!(pipeline.maybe_flush().unwrap().is_none());
    assert!(pipeline.ingest(&entry("2025-01-15T10:00:00Z", "INFO", "web", "ok")));
    let published = pipeline.maybe_flush().unwrap().expect("window should close");

    let received = sub.recv().await.unwrap();
    assert!(Arc::ptr_eq(&published, &received));
    assert_eq!(received.window_start, "2025-01-15T10:00:00Z");
    assert_eq!(received.root_service.as_deref(), Some("api"));
    assert_eq!(pipeline.stats().buffered, 0);
  }

  #[test]
  fn empty_flush_publishes_nothing() {
    let pipeline = small_pipeline(1);
    let sub = pipeline.subscribe();
    assert!(pipeline.flush_and_publish().unwrap().is_none());
    drop(sub);
  }

  #[tokio::test]
  async fn flush_checker_closes_expired_window() {
    let pipeline = Arc::new(Pipeline::new(PipelineConfig {
      flush_threshold: 1000,
      window: Duration::from_millis(20),
      flush_check_interval: Duration::from_millis(10),
      ..PipelineConfig::default()
    }));
    let mut sub = pipeline.subscribe();
    pipeline.ingest(&entry("2025-01-15T10:00:00Z", "INFO", "api", "tick"));

    let cancel = CancellationToken::new();
    let checker = {
      let pipeline = Arc::clone(&pipeline);
      let cancel = cancel.clone();
      tokio::spawn(async move { pipeline.run_flush_checker(cancel).await })
    };

    let bundle = tokio::time::timeout(Duration::from_secs(5), sub.recv())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(bundle.sequence.len(), 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), checker).await.unwrap().unwrap();
  }

  #[test]
  fn flush_detaches_window_without_publishing() {
    let pipeline = small_pipeline(100);
    let mut sub = pipeline.subscribe();
    pipeline.ingest(&entry("2025-01-15T10:00:01Z", "ERROR", "api", "boom"));
    pipeline.ingest(&entry("2025-01-15T10:00:00Z", "INFO", "web", "ok"));

    let window = pipeline.flush().expect("window should be non-empty");
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].message, "boom");
    assert!(sub.try_recv().is_none());
    assert_eq!(pipeline.stats().buffered, 0);
    assert!(pipeline.flush().is_none());
  }

  #[tokio::test]
  async fn shutdown_ends_subscriptions() {
    let pipeline = small_pipeline(1);
    let mut sub = pipeline.subscribe();
    pipeline.shutdown();
    assert!(sub.recv().await.is_none());
  }
}
