//! Structured error types for the correlation pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
  /// Caller-preventable misuse: empty record set, malformed entry collection.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// A log source could not be opened or read. Terminal for that source.
  #[error("source unavailable: {source_name}: {source}")]
  SourceUnavailable {
    source_name: String,
    #[source]
    source: std::io::Error,
  },

  /// A remote fetch failed. Terminal for that source.
  #[error("fetch failed: {url}: {reason}")]
  Fetch { url: String, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl PipelineError {
  pub fn invalid_input(msg: impl Into<String>) -> Self {
    Self::InvalidInput(msg.into())
  }

  pub fn source_unavailable(source_name: impl Into<String>, source: std::io::Error) -> Self {
    Self::SourceUnavailable {
      source_name: source_name.into(),
      source,
    }
  }

  pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
    Self::Fetch {
      url: url.into(),
      reason: reason.to_string(),
    }
  }
}
