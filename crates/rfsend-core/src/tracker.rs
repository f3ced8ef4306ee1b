//! Last-acknowledged-value state behind the change gate.

use std::collections::HashMap;

use crate::mask::ChangeMask;
use crate::reading::{Celsius, DecodedReading, SensorKey};

/// Per-sensor snapshot of the last successfully published values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Baseline {
    temperature: Option<Celsius>,
    humidity: Option<u8>,
    battery_ok: Option<bool>,
}

impl Baseline {
    fn of(reading: &DecodedReading) -> Baseline {
        Baseline {
            temperature: reading.temperature,
            humidity: reading.humidity,
            battery_ok: reading.battery_ok,
        }
    }
}

/// Tracks the last acknowledged reading per sensor and derives which
/// fields a new reading changes.
///
/// `update` is read-only; the baseline moves only through `acknowledge`,
/// which the caller invokes once the reading actually went out. A failed
/// publish keeps the old baseline, so the same delta shows up again on the
/// next reading from that sensor.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    baselines: HashMap<SensorKey, Baseline>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask of fields that differ from the last acknowledged baseline.
    ///
    /// A sensor seen for the first time reports every present field as
    /// changed. Invalid readings report nothing; their fields are not
    /// trustworthy enough to compare.
    pub fn update(&self, reading: &DecodedReading) -> ChangeMask {
        if !reading.valid {
            return ChangeMask::empty();
        }
        let base = match self.baselines.get(&reading.key()) {
            Some(base) => base,
            None => return present_fields(reading),
        };
        let mut mask = ChangeMask::empty();
        if reading.temperature.is_some() && reading.temperature != base.temperature {
            mask |= ChangeMask::TEMPERATURE;
        }
        if reading.humidity.is_some() && reading.humidity != base.humidity {
            mask |= ChangeMask::HUMIDITY;
        }
        if reading.battery_ok.is_some() && reading.battery_ok != base.battery_ok {
            mask |= ChangeMask::BATTERY;
        }
        mask
    }

    /// Commit the reading as the new baseline for its sensor.
    pub fn acknowledge(&mut self, reading: &DecodedReading) {
        self.baselines.insert(reading.key(), Baseline::of(reading));
    }

    /// Number of distinct sensors acknowledged so far.
    pub fn sensors_seen(&self) -> usize {
        self.baselines.len()
    }
}

fn present_fields(reading: &DecodedReading) -> ChangeMask {
    let mut mask = ChangeMask::empty();
    if reading.temperature.is_some() {
        mask |= ChangeMask::TEMPERATURE;
    }
    if reading.humidity.is_some() {
        mask |= ChangeMask::HUMIDITY;
    }
    if reading.battery_ok.is_some() {
        mask |= ChangeMask::BATTERY;
    }
    mask
}
