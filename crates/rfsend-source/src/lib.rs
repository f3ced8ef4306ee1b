//! Producers of decoded readings.
//!
//! The pipeline does not decode radio traffic itself; it consumes readings
//! an upstream decoder already produced. This crate provides the sources
//! the binary can run against: a JSON-lines reader for piped-in decoder
//! output and a generator for exercising a sink without hardware.
//!
//! Sources push into a bounded channel. When the publisher is stuck in a
//! slow HTTP exchange the channel fills up and the source waits; that is
//! the pipeline's only backpressure mechanism and it is deliberate.

pub mod demo;
pub mod jsonl;

pub use demo::{DemoSource, DemoSourceConfig};
pub use jsonl::JsonlSource;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use rfsend_core::DecodedReading;

/// Errors starting or driving a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source is already running")]
    AlreadyRunning,
}

/// A producer of decoded readings.
///
/// `start` spawns the production task and returns immediately; readings
/// flow through the channel until the source runs dry or `stop` is
/// called. Dropping the receiver also ends the source.
#[async_trait]
pub trait ReadingSource: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Begin producing into `tx`.
    async fn start(&mut self, tx: mpsc::Sender<DecodedReading>) -> Result<(), SourceError>;

    /// Stop producing. Idempotent.
    async fn stop(&mut self);
}
