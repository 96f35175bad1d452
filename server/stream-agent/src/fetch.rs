//! One-shot pull of a remote log endpoint.

use correlation_engine::encoding::TextEncoding;
use correlation_engine::PipelineError;
use tracing::debug;

/// GET `url` and split the body into trimmed, non-empty lines.
///
/// Transport errors and non-2xx statuses are terminal `Fetch` errors; there
/// is no retry.
pub async fn fetch_lines(client: &reqwest::Client, url: &str) -> Result<Vec<String>, PipelineError> {
  let resp = client
    .get(url)
    .send()
    .await
    .and_then(|r| r.error_for_status())
    .map_err(|e| PipelineError::fetch(url, e))?;
  let body = resp.bytes().await.map_err(|e| PipelineError::fetch(url, e))?;
  debug!(url, bytes = body.len(), "fetched remote logs");

  Ok(
    TextEncoding::decode_with_bom(&body)
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(str::to_string)
      .collect(),
  )
}
