//! HTTP handlers for the stream agent.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use correlation_engine::normalize::normalize_line;
use correlation_engine::tail::Tailer;
use correlation_engine::{source, CorrelationBundle, LogRecord, RawEntry, Subscription};
use futures_util::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::fetch;
use crate::state::{AppState, TailHandle};
use crate::types::*;

pub async fn health() -> &'static str {
  "ok"
}

/// Push a batch of raw entries, then close the window if it is due.
pub async fn ingest(
  State(state): State<Arc<AppState>>,
  Json(entries): Json<Vec<RawEntry>>,
) -> Result<Json<IngestResponse>, AgentError> {
  let accepted = entries.iter().filter(|e| state.pipeline.ingest(e)).count();
  let rejected = entries.len() - accepted;
  if rejected > 0 {
    warn!(rejected, "ingest hit buffer capacity");
  }

  let bundle = state.pipeline.maybe_flush()?;
  Ok(Json(IngestResponse {
    accepted,
    rejected,
    flushed: bundle.is_some(),
    bundle: bundle.map(|b| b.as_ref().clone()),
  }))
}

/// Open the file, backfill its last lines, then follow it in a background
/// task. Open failures are returned to the caller.
pub async fn start_tail(
  State(state): State<Arc<AppState>>,
  Json(req): Json<TailRequest>,
) -> Result<Json<TailStarted>, AgentError> {
  let path = PathBuf::from(&req.path);
  let tailer = Tailer::open(&path).await?;

  let mut accepted = 0;
  if let Some(n) = req.backfill_lines.filter(|&n| n > 0) {
    for line in source::read_last_lines(&path, n).await? {
      if state.pipeline.ingest(&RawEntry::line(line, req.service.as_str())) {
        accepted += 1;
      }
    }
    state.pipeline.maybe_flush()?;
  }

  let id = Uuid::new_v4();
  let cancel = state.shutdown.child_token();
  state.register_tail(TailHandle {
    status: TailStatus {
      id,
      path: req.path.clone(),
      service: req.service.clone(),
      started_at: Utc::now(),
    },
    cancel: cancel.clone(),
  });

  let task_state = Arc::clone(&state);
  let service = req.service;
  tokio::spawn(async move {
    let result = task_state.pipeline.follow(tailer, &service, &cancel).await;
    if let Err(e) = result {
      warn!(tail = %id, error = %e, "tail stopped");
    } else {
      info!(tail = %id, "tail finished");
    }
    task_state.forget_tail(id);
  });

  Ok(Json(TailStarted { id, accepted }))
}

pub async fn stop_tail(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, AgentError> {
  if state.stop_tail(id) {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(AgentError::UnknownTail(id))
  }
}

/// Pull a remote endpoint once and ingest each line as free text.
pub async fn fetch_remote(
  State(state): State<Arc<AppState>>,
  Json(req): Json<FetchRequest>,
) -> Result<Json<FetchResponse>, AgentError> {
  let lines = fetch::fetch_lines(&state.http, &req.url).await?;
  let accepted = lines
    .iter()
    .filter(|line| state.pipeline.ingest(&RawEntry::line(line.as_str(), req.service.as_str())))
    .count();
  let flushed = state.pipeline.maybe_flush()?.is_some();
  Ok(Json(FetchResponse {
    lines: lines.len(),
    accepted,
    flushed,
  }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
  let tails = state.tail_statuses();
  Json(StatusResponse {
    active: !tails.is_empty(),
    tails,
    buffer: state.pipeline.stats(),
    subscribers: state.pipeline.hub().subscriber_count(),
  })
}

/// Server-sent events: one `data:` JSON bundle per flushed window.
///
/// The subscription is dropped (and unsubscribed) when the client goes away
/// or the agent shuts down.
pub async fn live(
  State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
  let sub = state.pipeline.subscribe();
  info!(subscriber = sub.id(), "live stream opened");
  Sse::new(bundle_events(sub, state.shutdown.clone())).keep_alive(KeepAlive::default())
}

fn bundle_events(
  sub: Subscription,
  cancel: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
  stream::unfold((sub, cancel), |(mut sub, cancel)| async move {
    let bundle = sub.recv_until(&cancel).await?;
    let event = Event::default().json_data(bundle.as_ref()).unwrap_or_else(|e| {
      warn!(error = %e, "bundle serialization failed");
      Event::default().comment("serialization failed")
    });
    Some((Ok(event), (sub, cancel)))
  })
}

/// Read the last lines of a file and return them parsed. Nothing is buffered.
pub async fn read_logs(Query(q): Query<LogsQuery>) -> Result<Json<Vec<LogRecord>>, AgentError> {
  let lines = source::read_last_lines(std::path::Path::new(&q.path), q.lines).await?;
  let records = lines
    .iter()
    .map(|line| normalize_line(line, &q.service))
    .collect();
  Ok(Json(records))
}

/// Batch path: the body is a complete window.
pub async fn preprocess(body: String) -> Result<Json<CorrelationBundle>, AgentError> {
  Ok(Json(correlation_engine::preprocess_json(&body)?))
}
