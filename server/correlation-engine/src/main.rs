//! Binary entrypoint: read log lines from stdin, write bundle JSON lines to stdout.
//!
//! Each input line is either a JSON object (structured entry) or free text
//! attributed to `$LOGCORR_SERVICE`. Output lines are either:
//! - A CorrelationBundle (whenever a window closes, and once more at EOF)
//! - An ErrorOutput (when the buffer rejects an entry)

use std::io::{self, BufRead, Write};

use correlation_engine::types::{ErrorOutput, RawFields};
use correlation_engine::{Pipeline, PipelineConfig, RawEntry, SharedBundle};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
  // Logs go to stderr; stdout carries only JSON lines.
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "correlation_engine=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let service = std::env::var("LOGCORR_SERVICE").unwrap_or_else(|_| "unknown".into());
  let pipeline = Pipeline::new(PipelineConfig::from_env());

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        error!(error = %e, "stdin read failed");
        std::process::exit(1);
      }
    };

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let entry = match serde_json::from_str::<RawFields>(trimmed) {
      Ok(fields) if trimmed.starts_with('{') => RawEntry::Fields(fields),
      _ => RawEntry::line(trimmed, service.as_str()),
    };

    if !pipeline.ingest(&entry) {
      write_json(&mut out, &ErrorOutput::new("buffer full, entry rejected"))?;
      continue;
    }

    match pipeline.maybe_flush() {
      Ok(Some(bundle)) => write_bundle(&mut out, &bundle)?,
      Ok(None) => {}
      Err(e) => write_json(&mut out, &ErrorOutput::new(e.to_string()))?,
    }
  }

  // Close the final partial window.
  match pipeline.flush_and_publish() {
    Ok(Some(bundle)) => write_bundle(&mut out, &bundle)?,
    Ok(None) => {}
    Err(e) => write_json(&mut out, &ErrorOutput::new(e.to_string()))?,
  }

  let stats = pipeline.stats();
  info!(
    ingested = stats.ingested,
    rejected = stats.rejected,
    windows = stats.flushes,
    "input exhausted"
  );
  out.flush()?;
  Ok(())
}

fn write_bundle(out: &mut impl Write, bundle: &SharedBundle) -> io::Result<()> {
  write_json(out, bundle.as_ref())?;
  out.flush()
}

fn write_json<T: serde::Serialize>(out: &mut impl Write, value: &T) -> io::Result<()> {
  serde_json::to_writer(&mut *out, value)?;
  writeln!(out)
}
