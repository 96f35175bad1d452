//! Rotation-safe file tailing.
//!
//! Polling design: the file is opened once and positioned at its end; on EOF
//! the loop sleeps for the poll interval and retries. Before every read the
//! path is stat'ed; a length smaller than the current read offset means the
//! file was truncated or replaced, so it is reopened from byte zero.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::encoding::{LineDecoder, TextEncoding};
use crate::error::PipelineError;
use crate::normalize;
use crate::types::LogRecord;

const READ_CHUNK: usize = 8 * 1024;

/// An opened tail: file handle plus read position. Dropping it closes the
/// file.
pub struct Tailer {
  path: PathBuf,
  file: File,
  offset: u64,
  decoder: LineDecoder,
}

/// Stream lines appended to `path` into `on_record` until `cancel` fires.
///
/// Returns `Ok(())` on cancellation. Open failures and read errors are
/// terminal and returned as `SourceUnavailable`; only shrink-detected
/// rotation is recovered automatically.
pub async fn tail_file<F>(
  path: &Path,
  service: &str,
  poll_interval: Duration,
  cancel: &CancellationToken,
  on_record: F,
) -> Result<(), PipelineError>
where
  F: FnMut(LogRecord),
{
  Tailer::open(path)
    .await?
    .follow(service, poll_interval, cancel, on_record)
    .await
}

impl Tailer {
  /// Open `path` and position at its end. Fails if the path is missing,
  /// unreadable or not a regular file.
  pub async fn open(path: &Path) -> Result<Self, PipelineError> {
    open_at_end(path).await
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn offset(&self) -> u64 {
    self.offset
  }

  /// Follow the opened file until `cancel` fires.
  pub async fn follow<F>(
    mut self,
    service: &str,
    poll_interval: Duration,
    cancel: &CancellationToken,
    mut on_record: F,
  ) -> Result<(), PipelineError>
  where
    F: FnMut(LogRecord),
  {
    let path = self.path.clone();
    info!(path = %path.display(), service, offset = self.offset, "tailing file");

    let mut buf = vec![0u8; READ_CHUNK];
    loop {
      if cancel.is_cancelled() {
        break;
      }

      if let Ok(meta) = tokio::fs::metadata(&path).await {
        if meta.len() < self.offset {
          info!(
            path = %path.display(),
            previous = self.offset,
            current = meta.len(),
            "file shrank, reopening from start"
          );
          self = open_from_start(&path).await?;
        }
      }

      let n = self
        .file
        .read(&mut buf)
        .await
        .map_err(|e| unavailable(&path, e))?;

      if n == 0 {
        tokio::select! {
          _ = cancel.cancelled() => break,
          _ = tokio::time::sleep(poll_interval) => continue,
        }
      }

      self.offset += n as u64;
      self.decoder.push(&buf[..n]);
      while let Some(line) = self.decoder.next_line() {
        let line = line.trim();
        if line.is_empty() {
          continue;
        }
        on_record(normalize::normalize_line(line, service));
      }
    }

    debug!(path = %path.display(), "tail cancelled");
    Ok(())
  }
}

async fn open_at_end(path: &Path) -> Result<Tailer, PipelineError> {
  let mut file = File::open(path).await.map_err(|e| unavailable(path, e))?;
  let meta = file.metadata().await.map_err(|e| unavailable(path, e))?;
  if !meta.is_file() {
    return Err(unavailable(
      path,
      std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
    ));
  }
  let len = meta.len();
  if len == 0 {
    return Ok(Tailer {
      path: path.to_path_buf(),
      file,
      offset: 0,
      decoder: LineDecoder::from_start(),
    });
  }

  let mut head = [0u8; 3];
  let mut filled = 0;
  while filled < head.len() {
    let n = file
      .read(&mut head[filled..])
      .await
      .map_err(|e| unavailable(path, e))?;
    if n == 0 {
      break;
    }
    filled += n;
  }
  let (encoding, _) = TextEncoding::detect(&head[..filled]);

  file
    .seek(SeekFrom::Start(len))
    .await
    .map_err(|e| unavailable(path, e))?;

  Ok(Tailer {
    path: path.to_path_buf(),
    file,
    offset: len,
    decoder: LineDecoder::with_encoding(encoding),
  })
}

async fn open_from_start(path: &Path) -> Result<Tailer, PipelineError> {
  let file = File::open(path).await.map_err(|e| unavailable(path, e))?;
  Ok(Tailer {
    path: path.to_path_buf(),
    file,
    offset: 0,
    decoder: LineDecoder::from_start(),
  })
}

fn unavailable(path: &Path, err: std::io::Error) -> PipelineError {
  PipelineError::source_unavailable(path.display().to_string(), err)
}
