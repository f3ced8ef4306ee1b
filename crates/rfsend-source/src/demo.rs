//! Demo reading generator.
//!
//! Synthesizes plausible sensor traffic for exercising the pipeline without
//! any radio hardware attached. Readings drift slowly so the change tracker
//! has both deltas and repeats to work with, and a small fraction arrive
//! corrupted or flagged invalid, the way a real receiver sees them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::info;

use rfsend_core::{Celsius, DecodedReading};

use crate::{ReadingSource, SourceError};

/// Configuration for demo reading generation
#[derive(Debug, Clone)]
pub struct DemoSourceConfig {
    /// Interval between readings in milliseconds
    pub interval_ms: u64,

    /// Number of readings to generate (0 = infinite)
    pub count: u64,

    /// Model string to stamp on every reading
    pub model: String,

    /// How many sensors to simulate, round-robin across channels
    pub sensors: u8,
}

impl Default for DemoSourceConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            count: 0, // infinite
            model: "F007TH".to_string(),
            sensors: 3,
        }
    }
}

/// Synthetic reading source
pub struct DemoSource {
    config: DemoSourceConfig,
    running: Arc<AtomicBool>,
    generated: Arc<AtomicU64>,
}

impl DemoSource {
    pub fn new() -> Self {
        Self::with_config(DemoSourceConfig::default())
    }

    pub fn with_config(config: DemoSourceConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            generated: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Readings emitted since the source started.
    pub fn readings_generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    fn synthesize(config: &DemoSourceConfig, seq: u64) -> DecodedReading {
        let sensors = u64::from(config.sensors.max(1));
        let channel = (seq % sensors) as u8 + 1;
        let rolling_code = 0x40 + u16::from(channel);
        let cycle = seq / sensors;

        // corrupted transmissions surface as a non-zero decode status
        if seq % 23 == 7 {
            return DecodedReading {
                time: Utc::now(),
                model: config.model.clone(),
                channel,
                rolling_code,
                temperature: None,
                humidity: None,
                battery_ok: None,
                valid: false,
                decode_status: 0x0021,
            };
        }

        // slow triangle wave; temperature holds for two cycles at a time
        // so the tracker sees genuine repeats
        let phase = ((cycle / 2) % 20) as i32;
        let drift = if phase < 10 { phase } else { 20 - phase };
        let temperature = Celsius(195 + i32::from(channel) * 10 + drift);
        let humidity = 40 + channel + ((cycle / 4) % 10) as u8;

        DecodedReading {
            time: Utc::now(),
            model: config.model.clone(),
            channel,
            rolling_code,
            temperature: Some(temperature),
            humidity: Some(humidity),
            battery_ok: Some(cycle % 64 < 60),
            valid: seq % 41 != 11,
            decode_status: 0,
        }
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingSource for DemoSource {
    fn name(&self) -> &str {
        "demo"
    }

    async fn start(&mut self, tx: mpsc::Sender<DecodedReading>) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        info!(sensors = self.config.sensors, "starting demo reading source");

        let running = self.running.clone();
        let generated = self.generated.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut seq = 0u64;
            while running.load(Ordering::SeqCst) {
                if config.count > 0 && seq >= config.count {
                    break;
                }
                let reading = DemoSource::synthesize(&config, seq);
                if tx.send(reading).await.is_err() {
                    break;
                }
                generated.fetch_add(1, Ordering::Relaxed);
                seq += 1;
                tokio::time::sleep(Duration::from_millis(config.interval_ms)).await;
            }
            info!(
                "demo source stopped after {} readings",
                generated.load(Ordering::Relaxed)
            );
        });

        Ok(())
    }

    async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
