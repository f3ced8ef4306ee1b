//! JSON-lines reading source.
//!
//! One JSON object per line, in the `DecodedReading` schema. This is the
//! glue format for piping a decoder process into the publisher:
//!
//! ```text
//! rf-decoder --json | rfsend run --send-to http://host/data
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use rfsend_core::DecodedReading;

use crate::{ReadingSource, SourceError};

/// Reads readings from a file, or from stdin when no path is given.
/// Malformed lines are counted, reported and skipped.
pub struct JsonlSource {
    path: Option<PathBuf>,
    running: Arc<AtomicBool>,
    malformed: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl JsonlSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            running: Arc::new(AtomicBool::new(false)),
            malformed: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// Lines that failed to parse since the source started.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReadingSource for JsonlSource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn start(&mut self, tx: mpsc::Sender<DecodedReading>) -> Result<(), SourceError> {
        if self.handle.is_some() {
            return Err(SourceError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let malformed = self.malformed.clone();

        let handle = match &self.path {
            Some(path) => {
                let reader = BufReader::new(File::open(path).await?);
                tokio::spawn(pump_lines(reader, tx, running, malformed))
            }
            None => {
                let reader = BufReader::new(tokio::io::stdin());
                tokio::spawn(pump_lines(reader, tx, running, malformed))
            }
        };
        self.handle = Some(handle);
        Ok(())
    }

    async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            // a pending stdin read cannot be interrupted any other way
            handle.abort();
        }
    }
}

async fn pump_lines<R>(
    reader: BufReader<R>,
    tx: mpsc::Sender<DecodedReading>,
    running: Arc<AtomicBool>,
    malformed: Arc<AtomicU64>,
) where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut lines = reader.lines();
    while running.load(Ordering::SeqCst) {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<DecodedReading>(line) {
                    Ok(reading) => {
                        if tx.send(reading).await.is_err() {
                            // receiver gone, nobody left to publish
                            break;
                        }
                    }
                    Err(e) => {
                        malformed.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "skipping malformed input line");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "input read failed");
                break;
            }
        }
    }
    debug!("reading source drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn collect(source: &mut JsonlSource, max: usize) -> Vec<DecodedReading> {
        let (tx, mut rx) = mpsc::channel(8);
        source.start(tx).await.unwrap();
        let mut readings = Vec::new();
        while readings.len() < max {
            match timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(reading)) => readings.push(reading),
                Ok(None) => break,
                Err(_) => panic!("timed out waiting for readings"),
            }
        }
        readings
    }

    #[tokio::test]
    async fn test_reads_readings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"time":"2024-01-15T10:30:00Z","model":"F007TH","channel":1,"rolling_code":7,"temperature":21.5}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"time":"2024-01-15T10:31:00Z","model":"F007TH","channel":2,"rolling_code":9,"humidity":55}}"#
        )
        .unwrap();

        let mut source = JsonlSource::new(Some(file.path().to_path_buf()));
        let readings = collect(&mut source, 2).await;

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].channel, 1);
        assert_eq!(readings[1].humidity, Some(55));
        assert_eq!(source.malformed_lines(), 0);
        source.stop().await;
    }

    #[tokio::test]
    async fn test_skips_malformed_and_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not json").unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"time":"2024-01-15T10:30:00Z","model":"F007TH","channel":3,"rolling_code":7}}"#
        )
        .unwrap();
        writeln!(file, r#"{{"model": "incomplete"#).unwrap();

        let mut source = JsonlSource::new(Some(file.path().to_path_buf()));
        // ask for more than the file holds so collect drains to EOF
        let readings = collect(&mut source, 4).await;

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].channel, 3);
        assert_eq!(source.malformed_lines(), 2);
        source.stop().await;
    }

    #[tokio::test]
    async fn test_missing_file_fails_to_start() {
        let mut source = JsonlSource::new(Some(PathBuf::from("/nonexistent/readings.jsonl")));
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(source.start(tx).await, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file).unwrap();
        let mut source = JsonlSource::new(Some(file.path().to_path_buf()));
        let (tx, _rx) = mpsc::channel(8);
        source.start(tx.clone()).await.unwrap();
        assert!(matches!(
            source.start(tx).await,
            Err(SourceError::AlreadyRunning)
        ));
        source.stop().await;
    }
}
