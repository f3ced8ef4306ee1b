//! The decoded reading model.
//!
//! Readings arrive from an external decoder (radio front end, replayed
//! capture file, demo generator) already parsed into fields. The pipeline
//! never mutates a reading; it only decides whether and how to publish it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Temperature stored as tenths of a degree Celsius.
///
/// Decoders hand over integer tenths; keeping the integer all the way to
/// serialization means two readings of 21.5 °C always compare equal and
/// always render to the same bytes. On the wire the value is a plain JSON
/// number in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Celsius(pub i32);

impl Celsius {
    /// Degrees as a float, for wire formats that expect one.
    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 10;
        let frac = (self.0 % 10).abs();
        // -3 tenths is "-0.3"; integer division alone would lose the sign
        if self.0 < 0 && whole == 0 {
            write!(f, "-0.{frac}")
        } else {
            write!(f, "{whole}.{frac}")
        }
    }
}

impl Serialize for Celsius {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Celsius {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let degrees = f64::deserialize(deserializer)?;
        if !degrees.is_finite() {
            return Err(D::Error::custom("temperature must be a finite number"));
        }
        Ok(Celsius((degrees * 10.0).round() as i32))
    }
}

/// Identity of one physical sensor.
///
/// The rolling code is re-randomized when the sensor's battery is changed,
/// so two sensors on the same channel stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorKey {
    pub model: String,
    pub channel: u8,
    pub rolling_code: u16,
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ch{} id{:02x}", self.model, self.channel, self.rolling_code)
    }
}

/// One decoded sensor message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedReading {
    /// Capture timestamp.
    pub time: DateTime<Utc>,

    /// Sensor family, e.g. "F007TH".
    pub model: String,

    /// Channel selector on the sensor (1-8 on common families).
    pub channel: u8,

    /// Per-battery-cycle random identifier.
    pub rolling_code: u16,

    /// Temperature, when the message carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Celsius>,

    /// Relative humidity in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,

    /// Battery health flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_ok: Option<bool>,

    /// Checksum verification result from the decoder.
    #[serde(default = "default_valid")]
    pub valid: bool,

    /// Raw decoder status word; non-zero marks an undecodable capture.
    #[serde(default)]
    pub decode_status: u16,
}

fn default_valid() -> bool {
    true
}

impl DecodedReading {
    /// The sensor this reading came from.
    pub fn key(&self) -> SensorKey {
        SensorKey {
            model: self.model.clone(),
            channel: self.channel,
            rolling_code: self.rolling_code,
        }
    }

    /// Whether the decoder produced usable fields at all.
    pub fn is_decoded(&self) -> bool {
        self.decode_status == 0
    }
}
