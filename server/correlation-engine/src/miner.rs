//! Pattern mining: group a closed window of records by verbatim message.

use std::collections::HashMap;

use crate::types::{LogPattern, LogRecord};

/// Group records by exact message text.
///
/// Counts every occurrence and keeps first/last occurrence as the
/// lexicographic min/max of the RFC3339 timestamps. A group's `error_class`
/// is whatever the first record of that group carried; later records do not
/// update it (lossy by intent). Messages are not normalized, so embedded IDs
/// keep otherwise-identical events apart. Output order is unspecified.
pub fn mine(records: &[LogRecord]) -> Vec<LogPattern> {
  let mut groups: HashMap<&str, LogPattern> = HashMap::new();

  for record in records {
    let pattern = groups
      .entry(record.message.as_str())
      .or_insert_with(|| LogPattern {
        pattern: record.message.clone(),
        count: 0,
        first_occurrence: record.timestamp.clone(),
        last_occurrence: record.timestamp.clone(),
        error_class: record.error_class.clone(),
      });

    pattern.count += 1;
    if record.timestamp < pattern.first_occurrence {
      pattern.first_occurrence = record.timestamp.clone();
    }
    if record.timestamp > pattern.last_occurrence {
      pattern.last_occurrence = record.timestamp.clone();
    }
  }

  groups.into_values().collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Level;

  fn rec(ts: &str, message: &str, error_class: Option<&str>) -> LogRecord {
    LogRecord {
      timestamp: ts.into(),
      level: Level::Error,
      service: "api".into(),
      pod: None,
      message: message.into(),
      error_class: error_class.map(str::to_string),
    }
  }

  fn by_pattern(patterns: Vec<LogPattern>) -> HashMap<String, LogPattern> {
    patterns.into_iter().map(|p| (p.pattern.clone(), p)).collect()
  }

  #[test]
  fn counts_and_bounds_out_of_order_input() {
    let records = vec![
      rec("2025-01-15T10:05:00Z", "conn timeout", Some("Timeout")),
      rec("2025-01-15T10:01:00Z", "conn timeout", Some("Other")),
      rec("2025-01-15T10:09:00Z", "conn timeout", None),
      rec("2025-01-15T10:02:00Z", "db ok", None),
    ];
    let patterns = by_pattern(mine(&records));
    assert_eq!(patterns.len(), 2);

    let timeout = &patterns["conn timeout"];
    assert_eq!(timeout.count, 3);
    assert_eq!(timeout.first_occurrence, "2025-01-15T10:01:00Z");
    assert_eq!(timeout.last_occurrence, "2025-01-15T10:09:00Z");
    // Representative error class comes from the first record of the group.
    assert_eq!(timeout.error_class.as_deref(), Some("Timeout"));

    assert_eq!(patterns["db ok"].count, 1);
  }

  #[test]
  fn messages_are_not_normalized() {
    let records = vec![
      rec("2025-01-15T10:00:00Z", "request 1 failed", None),
      rec("2025-01-15T10:00:01Z", "request 2 failed", None),
    ];
    assert_eq!(mine(&records).len(), 2);
  }

  #[test]
  fn mining_merges_across_partitions() {
    let records = vec![
      rec("2025-01-15T10:00:00Z", "a", None),
      rec("2025-01-15T10:00:01Z", "b", None),
      rec("2025-01-15T10:00:02Z", "a", None),
    ];
    let whole = by_pattern(mine(&records));

    let mut merged: HashMap<String, u64> = HashMap::new();
    for r in &records {
      for p in mine(std::slice::from_ref(r)) {
        *merged.entry(p.pattern).or_insert(0) += p.count;
      }
    }

    assert_eq!(merged.len(), whole.len());
    for (pattern, count) in merged {
      assert_eq!(whole[&pattern].count, count);
    }
  }

  #[test]
  fn empty_input_yields_no_patterns() {
    assert!(mine(&[]).is_empty());
  }
}
