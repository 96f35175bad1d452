//! Batch path: a complete window supplied up front, no window buffer.

use crate::error::PipelineError;
use crate::normalize;
use crate::pipeline;
use crate::types::{CorrelationBundle, RawEntry};

/// Normalize, mine and assemble `entries` as a single window.
pub fn preprocess(entries: &[RawEntry]) -> Result<CorrelationBundle, PipelineError> {
  if entries.is_empty() {
    return Err(PipelineError::invalid_input("no log entries supplied"));
  }
  let records = entries.iter().map(normalize::normalize).collect();
  pipeline::assemble(records)
}

/// Parse a JSON array of raw entries and preprocess it.
pub fn preprocess_json(body: &str) -> Result<CorrelationBundle, PipelineError> {
  let value: serde_json::Value = serde_json::from_str(body)
    .map_err(|e| PipelineError::invalid_input(format!("invalid JSON body: {}", e)))?;
  if !value.is_array() {
    return Err(PipelineError::invalid_input(
      "expected a JSON array of log entries",
    ));
  }
  let entries: Vec<RawEntry> = serde_json::from_value(value)
    .map_err(|e| PipelineError::invalid_input(format!("malformed log entry: {}", e)))?;
  preprocess(&entries)
}
