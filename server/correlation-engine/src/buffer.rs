//! Window buffer: accumulates records from concurrent producers until a
//! count or time trigger closes the window.
//!
//! One mutex guards all buffer state. Each operation holds it only long
//! enough to push, inspect, or swap out the record vector; parsing, mining
//! and bundle assembly always happen outside the lock.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::types::LogRecord;

/// Point-in-time counters for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BufferStats {
  pub buffered: usize,
  pub ingested: u64,
  pub rejected: u64,
  pub flushes: u64,
}

struct BufferState {
  records: Vec<LogRecord>,
  last_flush: Instant,
  ingested: u64,
  rejected: u64,
  flushes: u64,
}

pub struct StreamManager {
  flush_threshold: usize,
  window: Duration,
  max_buffered: Option<usize>,
  state: Mutex<BufferState>,
}

impl StreamManager {
  pub fn new(config: &PipelineConfig) -> Self {
    Self {
      flush_threshold: config.flush_threshold.max(1),
      window: config.window,
      max_buffered: config.max_buffered,
      state: Mutex::new(BufferState {
        records: Vec::new(),
        last_flush: Instant::now(),
        ingested: 0,
        rejected: 0,
        flushes: 0,
      }),
    }
  }

  // A panicking producer cannot leave the Vec half-written, so a poisoned
  // lock is still safe to use.
  fn lock(&self) -> MutexGuard<'_, BufferState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Buffer one record. Returns `false` without blocking when the capacity
  /// ceiling is reached; the caller decides whether to retry or drop.
  pub fn ingest(&self, record: LogRecord) -> bool {
    let mut state = self.lock();
    if let Some(max) = self.max_buffered {
      if state.records.len() >= max {
        state.rejected += 1;
        return false;
      }
    }
    state.records.push(record);
    state.ingested += 1;
    true
  }

  /// True when the buffered window is non-empty and either holds
  /// `flush_threshold` records or has been open longer than `window`.
  pub fn should_flush(&self) -> bool {
    self.should_flush_at(Instant::now())
  }

  pub(crate) fn should_flush_at(&self, now: Instant) -> bool {
    let state = self.lock();
    if state.records.is_empty() {
      return false;
    }
    state.records.len() >= self.flush_threshold
      || now.saturating_duration_since(state.last_flush) > self.window
  }

  /// Detach the current window. Records ingested after the swap belong to
  /// the next window. The flush timer restarts even when nothing was taken.
  pub fn flush(&self) -> Option<Vec<LogRecord>> {
    let mut state = self.lock();
    state.last_flush = Instant::now();
    if state.records.is_empty() {
      return None;
    }
    state.flushes += 1;
    Some(std::mem::take(&mut state.records))
  }

  pub fn len(&self) -> usize {
    self.lock().records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn stats(&self) -> BufferStats {
    let state = self.lock();
    BufferStats {
      buffered: state.records.len(),
      ingested: state.ingested,
      rejected: state.rejected,
      flushes: state.flushes,
    }
  }
}
