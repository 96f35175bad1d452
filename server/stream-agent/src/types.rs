//! Request/response types for the stream agent.

use chrono::{DateTime, Utc};
use correlation_engine::{BufferStats, CorrelationBundle};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
  pub accepted: usize,
  pub rejected: usize,
  pub flushed: bool,
  pub bundle: Option<CorrelationBundle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailRequest {
  pub path: String,
  pub service: String,
  /// Ingest this many trailing lines before following the file.
  #[serde(default)]
  pub backfill_lines: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
  pub path: String,
  #[serde(default = "default_service")]
  pub service: String,
  /// Trailing line count; 0 reads the whole file.
  #[serde(default = "default_lines")]
  pub lines: usize,
}

fn default_service() -> String {
  correlation_engine::normalize::DEFAULT_SERVICE.to_string()
}

fn default_lines() -> usize {
  100
}

#[derive(Debug, Serialize)]
pub struct TailStarted {
  pub id: Uuid,
  pub accepted: usize,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
  pub url: String,
  pub service: String,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
  pub lines: usize,
  pub accepted: usize,
  pub flushed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TailStatus {
  pub id: Uuid,
  pub path: String,
  pub service: String,
  pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub active: bool,
  pub tails: Vec<TailStatus>,
  pub buffer: BufferStats,
  pub subscribers: usize,
}
