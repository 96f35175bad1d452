//! Local log correlation pipeline.
//!
//! Normalizes raw log entries, tails files with rotation recovery, buffers
//! records into windows, mines repeating patterns, and emits one
//! CorrelationBundle per window to any number of live subscribers.
//!
//! In-memory and best-effort; nothing survives a restart.

pub mod buffer;
pub mod bundle;
pub mod config;
pub mod encoding;
pub mod error;
pub mod hub;
pub mod miner;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod source;
pub mod tail;
pub mod types;

pub use buffer::{BufferStats, StreamManager};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use hub::{BroadcastHub, PublishReport, SharedBundle, Subscription};
pub use pipeline::Pipeline;
pub use preprocess::{preprocess, preprocess_json};
pub use types::{CorrelationBundle, Level, LogPattern, LogRecord, RawEntry, RawFields};
