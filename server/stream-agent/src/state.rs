//! Shared state for the stream agent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use correlation_engine::Pipeline;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::TailStatus;

pub struct TailHandle {
  pub status: TailStatus,
  pub cancel: CancellationToken,
}

pub struct AppState {
  pub pipeline: Arc<Pipeline>,
  pub http: reqwest::Client,
  /// Parent of every tail token; cancelled on shutdown.
  pub shutdown: CancellationToken,
  tails: Mutex<HashMap<Uuid, TailHandle>>,
}

impl AppState {
  pub fn new(pipeline: Arc<Pipeline>, http: reqwest::Client, shutdown: CancellationToken) -> Self {
    Self {
      pipeline,
      http,
      shutdown,
      tails: Mutex::new(HashMap::new()),
    }
  }

  fn tails(&self) -> MutexGuard<'_, HashMap<Uuid, TailHandle>> {
    self.tails.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn register_tail(&self, handle: TailHandle) {
    self.tails().insert(handle.status.id, handle);
  }

  /// Remove a tail and cancel it. Returns false for unknown ids.
  pub fn stop_tail(&self, id: Uuid) -> bool {
    match self.tails().remove(&id) {
      Some(handle) => {
        handle.cancel.cancel();
        true
      }
      None => false,
    }
  }

  /// Forget a tail whose task already ended.
  pub fn forget_tail(&self, id: Uuid) {
    self.tails().remove(&id);
  }

  pub fn tail_statuses(&self) -> Vec<TailStatus> {
    let mut statuses: Vec<TailStatus> = self.tails().values().map(|h| h.status.clone()).collect();
    statuses.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    statuses
  }
}
