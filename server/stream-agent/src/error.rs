//! HTTP error mapping for the stream agent.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use correlation_engine::types::ErrorOutput;
use correlation_engine::PipelineError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AgentError {
  #[error(transparent)]
  Pipeline(#[from] PipelineError),

  #[error("unknown tail: {0}")]
  UnknownTail(Uuid),
}

impl AgentError {
  fn status(&self) -> StatusCode {
    match self {
      Self::Pipeline(PipelineError::InvalidInput(_)) | Self::Pipeline(PipelineError::Json(_)) => {
        StatusCode::BAD_REQUEST
      }
      Self::Pipeline(PipelineError::SourceUnavailable { .. }) => StatusCode::BAD_REQUEST,
      Self::Pipeline(PipelineError::Fetch { .. }) => StatusCode::BAD_GATEWAY,
      Self::UnknownTail(_) => StatusCode::NOT_FOUND,
    }
  }
}

impl IntoResponse for AgentError {
  fn into_response(self) -> Response {
    let status = self.status();
    let mut body = ErrorOutput::new(self.to_string());
    if let Self::Pipeline(PipelineError::SourceUnavailable { source_name, .. }) = &self {
      body = body.with_field(source_name.clone());
    }
    (status, Json(body)).into_response()
  }
}
