//! Normalize raw entries into canonical LogRecords.
//!
//! Normalization never fails: missing or unusable fields fall back to
//! defaults (ingestion time, INFO, "unknown").

use chrono::{SecondsFormat, Utc};

use crate::types::*;

pub const DEFAULT_SERVICE: &str = "unknown";

/// Free-text level tokens, in priority order (first match wins).
const LINE_LEVELS: [(&str, Level); 4] = [
  ("ERROR", Level::Error),
  ("WARN", Level::Warn),
  ("INFO", Level::Info),
  ("DEBUG", Level::Debug),
];

/// Normalize one raw entry into a LogRecord.
pub fn normalize(raw: &RawEntry) -> LogRecord {
  match raw {
    RawEntry::Fields(fields) => normalize_fields(fields),
    RawEntry::Line { line, service } => normalize_line(line, service),
  }
}

/// Structured entry: copy known fields, default the rest.
pub fn normalize_fields(raw: &RawFields) -> LogRecord {
  let timestamp = non_empty(&raw.timestamp)
    .map(str::to_string)
    .unwrap_or_else(now_timestamp);

  let level = non_empty(&raw.level)
    .map(Level::from_str_loose)
    .unwrap_or_default();

  let service = non_empty(&raw.service)
    .unwrap_or(DEFAULT_SERVICE)
    .to_string();

  LogRecord {
    timestamp,
    level,
    service,
    pod: raw.pod.clone(),
    message: raw.message.clone().unwrap_or_default(),
    error_class: raw.error_class.clone(),
  }
}

/// Free-text line from a known service. Level is inferred from literal
/// tokens; a leading date/time is stripped from the message body.
pub fn normalize_line(line: &str, service: &str) -> LogRecord {
  let line = line.trim();

  let level = LINE_LEVELS
    .iter()
    .find(|(token, _)| line.contains(token))
    .map(|(_, level)| level.clone())
    .unwrap_or_default();

  let service = if service.is_empty() {
    DEFAULT_SERVICE
  } else {
    service
  };

  LogRecord {
    timestamp: now_timestamp(),
    level,
    service: service.to_string(),
    pod: None,
    message: strip_leading_timestamp(line).to_string(),
    error_class: None,
  }
}

/// Current UTC time as second-precision RFC3339 (`2025-01-15T10:30:00Z`).
pub fn now_timestamp() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn non_empty(v: &Option<String>) -> Option<&str> {
  v.as_deref().filter(|s| !s.is_empty())
}

/// Strip a leading `YYYY-MM-DD[ T]HH:MM:SS` (plus optional fraction and zone).
fn strip_leading_timestamp(line: &str) -> &str {
  const SHAPE: &[u8; 19] = b"dddd-dd-dd?dd:dd:dd";

  let b = line.as_bytes();
  if b.len() < SHAPE.len() {
    return line;
  }
  let matches = SHAPE.iter().zip(b).all(|(&want, &got)| match want {
    b'd' => got.is_ascii_digit(),
    b'?' => got == b' ' || got == b'T',
    _ => got == want,
  });
  if !matches {
    return line;
  }

  let mut i = SHAPE.len();
  // Fractional seconds.
  if i < b.len() && (b[i] == b'.' || b[i] == b',') && b.get(i + 1).is_some_and(u8::is_ascii_digit) {
    i += 1;
    while i < b.len() && b[i].is_ascii_digit() {
      i += 1;
    }
  }
  // Zone: Z, +HH:MM, -HHMM.
  if i < b.len() && b[i] == b'Z' {
    i += 1;
  } else if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
    let mut j = i + 1;
    let mut digits = 0;
    while j < b.len() && (b[j].is_ascii_digit() || (b[j] == b':' && digits == 2)) {
      if b[j].is_ascii_digit() {
        digits += 1;
      }
      j += 1;
    }
    if digits == 4 {
      i = j;
    }
  }

  line[i..].trim()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{DateTime, SubsecRound};

  #[test]
  fn strip_leading_timestamp_basics() {
    assert_eq!(strip_leading_timestamp("2025-01-15 10:30:00 ERROR boom"), "ERROR boom");
    assert_eq!(strip_leading_timestamp("2025-01-15T10:30:00Z api up"), "api up");
    assert_eq!(
      strip_leading_timestamp("2025-01-15T10:30:00.123+02:00 [db] slow"),
      "[db] slow"
    );
    assert_eq!(strip_leading_timestamp("no time here"), "no time here");
    assert_eq!(strip_leading_timestamp("2025-01-15 boom"), "2025-01-15 boom");
  }

  #[test]
  fn line_level_priority() {
    assert_eq!(normalize_line("ERROR and WARN", "api").level, Level::Error);
    assert_eq!(normalize_line("WARN then INFO", "api").level, Level::Warn);
    assert_eq!(normalize_line("INFO with DEBUG", "api").level, Level::Info);
    assert_eq!(normalize_line("DEBUG only", "api").level, Level::Debug);
    assert_eq!(normalize_line("plain text", "api").level, Level::Info);
  }

  #[test]
  fn line_defaults_service_and_trims() {
    let rec = normalize_line("  2025-01-15 10:30:00 WARN disk low  ", "");
    assert_eq!(rec.service, "unknown");
    assert_eq!(rec.message, "WARN disk low");
    assert_eq!(rec.pod, None);
  }

  #[test]
  fn fields_copy_known_values() {
    let raw = RawFields {
      timestamp: Some("2025-01-15T10:30:00Z".into()),
      level: Some("error".into()),
      service: Some("payments".into()),
      pod: Some("payments-7d9".into()),
      message: Some("conn timeout".into()),
      error_class: Some("TimeoutError".into()),
    };
    let rec = normalize_fields(&raw);
    assert_eq!(rec.timestamp, "2025-01-15T10:30:00Z");
    assert_eq!(rec.level, Level::Error);
    assert_eq!(rec.service, "payments");
    assert_eq!(rec.pod.as_deref(), Some("payments-7d9"));
    assert_eq!(rec.error_class.as_deref(), Some("TimeoutError"));
  }

  #[test]
  fn fields_fall_back_to_defaults() {
    let rec = normalize_fields(&RawFields {
      level: Some(String::new()),
      service: Some(String::new()),
      ..RawFields::default()
    });
    assert_eq!(rec.level, Level::Info);
    assert_eq!(rec.service, "unknown");
    assert_eq!(rec.message, "");
  }

  #[test]
  fn missing_timestamp_is_ingestion_time() {
    let before = Utc::now().trunc_subsecs(0);
    let rec = normalize(&RawEntry::Fields(RawFields::default()));
    let after = Utc::now();
    let ts = DateTime::parse_from_rfc3339(&rec.timestamp)
      .unwrap()
      .with_timezone(&Utc);
    assert!(ts >= before && ts <= after, "{} not in [{}, {}]", ts, before, after);
  }
}
