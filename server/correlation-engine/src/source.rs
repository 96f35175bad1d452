//! One-shot reads of a log file's most recent lines (backfill before tailing).

use std::path::Path;

use crate::encoding::TextEncoding;
use crate::error::PipelineError;

/// Last `n` non-empty lines of `path`, oldest first. `n == 0` means all.
///
/// BOM-prefixed UTF-16 files are decoded; anything else is read as UTF-8.
pub async fn read_last_lines(path: &Path, n: usize) -> Result<Vec<String>, PipelineError> {
  let bytes = tokio::fs::read(path)
    .await
    .map_err(|e| PipelineError::source_unavailable(path.display().to_string(), e))?;
  Ok(last_lines(&TextEncoding::decode_with_bom(&bytes), n))
}

fn last_lines(content: &str, n: usize) -> Vec<String> {
  let lines: Vec<&str> = content
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .collect();
  let start = if n == 0 { 0 } else { lines.len().saturating_sub(n) };
  lines[start..].iter().map(|l| l.to_string()).collect()
}
