//! Assemble a CorrelationBundle from one closed window.

use std::collections::BTreeSet;

use crate::error::PipelineError;
use crate::types::*;

/// `errorRateZ` when any record is at ERROR level.
pub const ERROR_RATE_SIGNAL: f64 = 5.0;
/// `latencyZ` when message text mentions a timeout or message backlog.
pub const LATENCY_SIGNAL: f64 = 3.0;

const LATENCY_KEYWORDS: [&str; 2] = ["timeout", "messages"];

/// Build a bundle from a non-empty window and its mined patterns.
///
/// Records are stable-sorted by timestamp, so equal timestamps keep arrival
/// order in `sequence`.
pub fn build(
  mut records: Vec<LogRecord>,
  patterns: Vec<LogPattern>,
) -> Result<CorrelationBundle, PipelineError> {
  if records.is_empty() {
    return Err(PipelineError::invalid_input(
      "cannot create bundle from empty logs",
    ));
  }
  records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

  let window_start = records[0].timestamp.clone();
  let window_end = records[records.len() - 1].timestamp.clone();

  let affected_services: Vec<String> = records
    .iter()
    .map(|r| r.service.as_str())
    .collect::<BTreeSet<_>>()
    .into_iter()
    .map(str::to_string)
    .collect();

  let root_service = records
    .iter()
    .find(|r| r.level.is_failure())
    .map(|r| r.service.clone());

  let metrics = heuristic_metrics(&records);

  let sequence = records
    .iter()
    .enumerate()
    .map(|(index, r)| SequenceItem {
      timestamp: r.timestamp.clone(),
      kind: "log".into(),
      message: format!("[{}] {}", r.service, r.message),
      index,
    })
    .collect();

  let derived_root_cause_hint = match &root_service {
    Some(service) => format!("Issue detected in {}", service),
    None => "Unknown issue".to_string(),
  };

  Ok(CorrelationBundle {
    window_start,
    window_end,
    root_service,
    // No dependency inference yet: every affected service is a node.
    dependency_graph: affected_services.clone(),
    affected_services,
    log_patterns: patterns,
    events: Vec::new(),
    metrics,
    sequence,
    derived_root_cause_hint,
  })
}

/// Keyword/level placeholder signals, not statistics.
///
/// Kept in one place so a real scorer can replace it without touching
/// bundle assembly.
pub fn heuristic_metrics(records: &[LogRecord]) -> Metrics {
  let error_rate_z = if records.iter().any(|r| r.level == Level::Error) {
    ERROR_RATE_SIGNAL
  } else {
    0.0
  };

  // Keywords contain no spaces, so matching per message equals matching the
  // space-joined text of the whole window.
  let latency_z = if records.iter().any(|r| {
    let lower = r.message.to_lowercase();
    LATENCY_KEYWORDS.iter().any(|k| lower.contains(k))
  }) {
    LATENCY_SIGNAL
  } else {
    0.0
  };

  Metrics {
    error_rate_z,
    latency_z,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rec(ts: &str, level: Level, service: &str, message: &str) -> LogRecord {
    LogRecord {
      timestamp: ts.into(),
      level,
      service: service.into(),
      pod: None,
      message: message.into(),
      error_class: None,
    }
  }

  #[test]
  fn empty_window_is_invalid_input() {
    let err = build(Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
  }

  #[test]
  fn window_bounds_and_stable_sequence() {
    let records = vec![
      rec("2025-01-15T10:02:00Z", Level::Info, "b", "second"),
      rec("2025-01-15T10:01:00Z", Level::Info, "a", "first"),
      rec("2025-01-15T10:02:00Z", Level::Info, "a", "third"),
    ];
    let bundle = build(records, Vec::new()).unwrap();
    assert_eq!(bundle.window_start, "2025-01-15T10:01:00Z");
    assert_eq!(bundle.window_end, "2025-01-15T10:02:00Z");
    let messages: Vec<&str> = bundle.sequence.iter().map(|s| s.message.as_str()).collect();
    assert_eq!(messages, vec!["[a] first", "[b] second", "[a] third"]);
    let indices: Vec<usize> = bundle.sequence.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(bundle.sequence.iter().all(|s| s.kind == "log"));
  }

  #[test]
  fn root_service_is_first_failure_in_time_order() {
    let records = vec![
      rec("2025-01-15T10:05:00Z", Level::Error, "api", "late error"),
      rec("2025-01-15T10:01:00Z", Level::Info, "web", "fine"),
      rec("2025-01-15T10:03:00Z", Level::Fatal, "db", "crash"),
    ];
    let bundle = build(records, Vec::new()).unwrap();
    assert_eq!(bundle.root_service.as_deref(), Some("db"));
    assert_eq!(bundle.derived_root_cause_hint, "Issue detected in db");
  }

  #[test]
  fn no_failure_means_unknown_issue() {
    let records = vec![rec("2025-01-15T10:00:00Z", Level::Warn, "api", "slow")];
    let bundle = build(records, Vec::new()).unwrap();
    assert_eq!(bundle.root_service, None);
    assert_eq!(bundle.derived_root_cause_hint, "Unknown issue");
    assert_eq!(bundle.metrics, Metrics::default());
  }

  #[test]
  fn services_deduplicated_and_graph_mirrors_them() {
    let records = vec![
      rec("2025-01-15T10:00:00Z", Level::Info, "web", "x"),
      rec("2025-01-15T10:00:01Z", Level::Info, "api", "y"),
      rec("2025-01-15T10:00:02Z", Level::Info, "web", "z"),
    ];
    let bundle = build(records, Vec::new()).unwrap();
    assert_eq!(bundle.affected_services, vec!["api", "web"]);
    assert_eq!(bundle.dependency_graph, bundle.affected_services);
    assert!(bundle.events.is_empty());
  }

  #[test]
  fn heuristic_signals() {
    let critical_only = vec![rec("t", Level::Critical, "a", "Too many MESSAGES queued")];
    let m = heuristic_metrics(&critical_only);
    // Only ERROR drives the error-rate signal.
    assert_eq!(m.error_rate_z, 0.0);
    assert_eq!(m.latency_z, LATENCY_SIGNAL);

    let error = vec![rec("t", Level::Error, "a", "Upstream TimeOut")];
    let m = heuristic_metrics(&error);
    assert_eq!(m.error_rate_z, ERROR_RATE_SIGNAL);
    assert_eq!(m.latency_z, LATENCY_SIGNAL);

    let quiet = vec![rec("t", Level::Info, "a", "time out of range")];
    assert_eq!(heuristic_metrics(&quiet), Metrics::default());
  }
}
