//! Core types for the correlation pipeline (JSON contracts + internal models).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what producers send)
// ---------------------------------------------------------------------------

/// Loosely-typed structured entry. Every field is optional; values of the
/// wrong JSON type are treated as absent and unknown keys are ignored, so any
/// JSON object deserializes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawFields {
  #[serde(deserialize_with = "lenient_string")]
  pub timestamp: Option<String>,
  #[serde(deserialize_with = "lenient_string")]
  pub level: Option<String>,
  #[serde(deserialize_with = "lenient_string")]
  pub service: Option<String>,
  #[serde(deserialize_with = "lenient_string")]
  pub pod: Option<String>,
  #[serde(deserialize_with = "lenient_string")]
  pub message: Option<String>,
  #[serde(deserialize_with = "lenient_string")]
  pub error_class: Option<String>,
}

/// One raw entry before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireEntry")]
pub enum RawEntry {
  /// Structured key/value entry (HTTP push, JSON lines).
  Fields(RawFields),
  /// Free-text line from a known service (file tail, fetched body).
  Line { line: String, service: String },
}

impl RawEntry {
  pub fn line(line: impl Into<String>, service: impl Into<String>) -> Self {
    Self::Line {
      line: line.into(),
      service: service.into(),
    }
  }
}

/// JSON shape accepted for a raw entry: an object or a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireEntry {
  Fields(RawFields),
  Line(String),
}

impl From<WireEntry> for RawEntry {
  fn from(w: WireEntry) -> Self {
    match w {
      WireEntry::Fields(f) => RawEntry::Fields(f),
      WireEntry::Line(line) => RawEntry::Line {
        line,
        service: crate::normalize::DEFAULT_SERVICE.to_string(),
      },
    }
  }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = serde_json::Value::deserialize(deserializer)?;
  Ok(match value {
    serde_json::Value::String(s) => Some(s),
    _ => None,
  })
}

// ---------------------------------------------------------------------------
// Level enum (normalized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Level {
  Trace,
  Debug,
  Info,
  Warn,
  Error,
  Fatal,
  Critical,
  /// Unrecognized level, kept verbatim.
  Other(String),
}

impl Level {
  pub fn from_str_loose(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "trace" => Self::Trace,
      "debug" => Self::Debug,
      "info" => Self::Info,
      "warn" | "warning" => Self::Warn,
      "error" | "err" => Self::Error,
      "fatal" => Self::Fatal,
      "critical" | "crit" => Self::Critical,
      _ => Self::Other(s.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Trace => "TRACE",
      Self::Debug => "DEBUG",
      Self::Info => "INFO",
      Self::Warn => "WARN",
      Self::Error => "ERROR",
      Self::Fatal => "FATAL",
      Self::Critical => "CRITICAL",
      Self::Other(s) => s,
    }
  }

  /// ERROR, FATAL and CRITICAL qualify a record as a root-cause candidate.
  pub fn is_failure(&self) -> bool {
    matches!(self, Self::Error | Self::Fatal | Self::Critical)
  }
}

impl Default for Level {
  fn default() -> Self {
    Self::Info
  }
}

impl std::fmt::Display for Level {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for Level {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for Level {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(Self::from_str_loose(&s))
  }
}

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

/// Canonical log record after normalization. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
  /// RFC3339; lexicographic order is chronological order.
  pub timestamp: String,
  pub level: Level,
  pub service: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pod: Option<String>,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_class: Option<String>,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

/// Records sharing one verbatim message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPattern {
  pub pattern: String,
  pub count: u64,
  pub first_occurrence: String,
  pub last_occurrence: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_class: Option<String>,
}

/// Heuristic scores. Not statistical z-scores.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
  pub error_rate_z: f64,
  pub latency_z: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceItem {
  pub timestamp: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub message: String,
  pub index: usize,
}

/// Summary of one flushed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationBundle {
  pub window_start: String,
  pub window_end: String,
  pub root_service: Option<String>,
  pub affected_services: Vec<String>,
  pub log_patterns: Vec<LogPattern>,
  pub events: Vec<String>,
  pub metrics: Metrics,
  pub dependency_graph: Vec<String>,
  pub sequence: Vec<SequenceItem>,
  pub derived_root_cause_hint: String,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for rejected input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
