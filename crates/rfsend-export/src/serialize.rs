//! Wire-format rendering of readings into the payload buffer.
//!
//! Both dialects are deterministic: for a fixed reading and mask the
//! rendered bytes are identical on every call. The REST dialect is one
//! JSON object; the InfluxDB dialect is one line-protocol record per
//! selected field.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use rfsend_core::{Celsius, ChangeMask, DecodedReading, SinkKind};

use crate::buffer::PayloadBuf;

/// JSON document for the REST dialect. Field order is declaration order,
/// so a given reading always renders to the same bytes.
#[derive(Serialize)]
struct RestPayload<'a> {
    time: DateTime<Utc>,
    model: &'a str,
    channel: u8,
    rolling_code: u16,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<Celsius>,
    #[serde(skip_serializing_if = "Option::is_none")]
    humidity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_ok: Option<bool>,
}

/// Render `reading` into `buf` in the sink's dialect, restricted to the
/// fields selected by `mask`.
///
/// Returns the payload length, or `None` when there is nothing to send:
/// no selected field is present on the reading, or the rendering did not
/// fit the buffer. The buffer is left empty in the `None` case.
pub fn render(
    reading: &DecodedReading,
    mask: ChangeMask,
    kind: SinkKind,
    buf: &mut PayloadBuf,
) -> Option<usize> {
    buf.reset();
    let ok = match kind {
        SinkKind::Rest => render_rest(reading, mask, buf),
        SinkKind::InfluxLine => render_influx(reading, mask, buf),
    };
    if !ok || buf.is_empty() {
        buf.reset();
        return None;
    }
    Some(buf.len())
}

fn render_rest(reading: &DecodedReading, mask: ChangeMask, buf: &mut PayloadBuf) -> bool {
    let temperature = reading
        .temperature
        .filter(|_| mask.contains(ChangeMask::TEMPERATURE));
    let humidity = reading
        .humidity
        .filter(|_| mask.contains(ChangeMask::HUMIDITY));
    let battery_ok = reading
        .battery_ok
        .filter(|_| mask.contains(ChangeMask::BATTERY));
    if temperature.is_none() && humidity.is_none() && battery_ok.is_none() {
        // nothing selected; the caller maps the empty buffer to None
        return true;
    }
    let payload = RestPayload {
        time: reading.time,
        model: &reading.model,
        channel: reading.channel,
        rolling_code: reading.rolling_code,
        valid: reading.valid,
        temperature,
        humidity,
        battery_ok,
    };
    serde_json::to_writer(&mut *buf, &payload).is_ok()
}

fn render_influx(reading: &DecodedReading, mask: ChangeMask, buf: &mut PayloadBuf) -> bool {
    let ts = match reading.time.timestamp_nanos_opt() {
        Some(ts) => ts,
        // timestamp outside the nanosecond-representable range
        None => return false,
    };
    let model = escape_tag_value(&reading.model);

    if mask.contains(ChangeMask::TEMPERATURE) {
        if let Some(t) = reading.temperature {
            if write_line(buf, "temperature", reading, &model, FieldValue::Float(t), ts).is_err() {
                return false;
            }
        }
    }
    if mask.contains(ChangeMask::HUMIDITY) {
        if let Some(h) = reading.humidity {
            if write_line(buf, "humidity", reading, &model, FieldValue::Integer(h), ts).is_err() {
                return false;
            }
        }
    }
    if mask.contains(ChangeMask::BATTERY) {
        if let Some(b) = reading.battery_ok {
            if write_line(buf, "battery", reading, &model, FieldValue::Boolean(b), ts).is_err() {
                return false;
            }
        }
    }
    true
}

/// Line-protocol field value with its type marker.
enum FieldValue {
    Float(Celsius),
    Integer(u8),
    Boolean(bool),
}

/// One record: measurement, tags in alphabetical key order, the single
/// `value` field, and the timestamp in nanoseconds.
fn write_line(
    buf: &mut PayloadBuf,
    measurement: &str,
    reading: &DecodedReading,
    model: &str,
    value: FieldValue,
    ts: i64,
) -> std::io::Result<()> {
    write!(
        buf,
        "{},channel={},model={},rolling_code={} value=",
        measurement, reading.channel, model, reading.rolling_code
    )?;
    match value {
        FieldValue::Float(v) => write!(buf, "{v}")?,
        FieldValue::Integer(v) => write!(buf, "{v}i")?,
        FieldValue::Boolean(v) => write!(buf, "{v}")?,
    }
    writeln!(buf, " {ts}")
}

/// Escape a tag value per the line protocol: commas, equals signs and
/// spaces get a backslash.
fn escape_tag_value(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading() -> DecodedReading {
        DecodedReading {
            time: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            model: "F007TH".to_string(),
            channel: 2,
            rolling_code: 42,
            temperature: Some(Celsius(215)),
            humidity: Some(47),
            battery_ok: Some(true),
            valid: true,
            decode_status: 0,
        }
    }

    fn rendered(reading: &DecodedReading, mask: ChangeMask, kind: SinkKind) -> Option<String> {
        let mut buf = PayloadBuf::with_capacity(8192);
        render(reading, mask, kind, &mut buf)?;
        Some(String::from_utf8(buf.as_bytes().to_vec()).unwrap())
    }

    #[test]
    fn test_rest_full_payload() {
        let out = rendered(&reading(), ChangeMask::all(), SinkKind::Rest).unwrap();
        assert_eq!(
            out,
            r#"{"time":"2024-01-15T10:30:00Z","model":"F007TH","channel":2,"rolling_code":42,"valid":true,"temperature":21.5,"humidity":47,"battery_ok":true}"#
        );
    }

    #[test]
    fn test_rest_masked_subset() {
        let out = rendered(&reading(), ChangeMask::TEMPERATURE, SinkKind::Rest).unwrap();
        assert!(out.contains("\"temperature\":21.5"));
        assert!(!out.contains("humidity"));
        assert!(!out.contains("battery_ok"));
        // identity always rides along
        assert!(out.contains("\"model\":\"F007TH\""));
        assert!(out.contains("\"valid\":true"));
    }

    #[test]
    fn test_rest_invalid_reading_carries_flag() {
        let mut r = reading();
        r.valid = false;
        let out = rendered(&r, ChangeMask::all(), SinkKind::Rest).unwrap();
        assert!(out.contains("\"valid\":false"));
    }

    #[test]
    fn test_empty_mask_renders_nothing() {
        let mut buf = PayloadBuf::with_capacity(8192);
        assert!(render(&reading(), ChangeMask::empty(), SinkKind::Rest, &mut buf).is_none());
        assert!(buf.is_empty());
        assert!(render(&reading(), ChangeMask::empty(), SinkKind::InfluxLine, &mut buf).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_selected_but_absent_field_renders_nothing() {
        let mut r = reading();
        r.humidity = None;
        assert!(rendered(&r, ChangeMask::HUMIDITY, SinkKind::Rest).is_none());
        assert!(rendered(&r, ChangeMask::HUMIDITY, SinkKind::InfluxLine).is_none());
    }

    #[test]
    fn test_influx_all_fields() {
        let out = rendered(&reading(), ChangeMask::all(), SinkKind::InfluxLine).unwrap();
        assert_eq!(
            out,
            "temperature,channel=2,model=F007TH,rolling_code=42 value=21.5 1705314600000000000\n\
             humidity,channel=2,model=F007TH,rolling_code=42 value=47i 1705314600000000000\n\
             battery,channel=2,model=F007TH,rolling_code=42 value=true 1705314600000000000\n"
        );
    }

    #[test]
    fn test_influx_single_field() {
        let out = rendered(&reading(), ChangeMask::BATTERY, SinkKind::InfluxLine).unwrap();
        assert_eq!(
            out,
            "battery,channel=2,model=F007TH,rolling_code=42 value=true 1705314600000000000\n"
        );
    }

    #[test]
    fn test_influx_escapes_model_tag() {
        let mut r = reading();
        r.model = "AcuRite 00592TXR,v=2".to_string();
        let out = rendered(&r, ChangeMask::TEMPERATURE, SinkKind::InfluxLine).unwrap();
        assert!(out.starts_with("temperature,channel=2,model=AcuRite\\ 00592TXR\\,v\\=2,rolling_code=42 "));
    }

    #[test]
    fn test_negative_temperature_rendering() {
        let mut r = reading();
        r.temperature = Some(Celsius(-3));
        let influx = rendered(&r, ChangeMask::TEMPERATURE, SinkKind::InfluxLine).unwrap();
        assert!(influx.contains(" value=-0.3 "));
        let rest = rendered(&r, ChangeMask::TEMPERATURE, SinkKind::Rest).unwrap();
        assert!(rest.contains("\"temperature\":-0.3"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = reading();
        for kind in [SinkKind::Rest, SinkKind::InfluxLine] {
            let a = rendered(&r, ChangeMask::all(), kind).unwrap();
            let b = rendered(&r, ChangeMask::all(), kind).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_returned_length_matches_buffer() {
        let mut buf = PayloadBuf::with_capacity(8192);
        let len = render(&reading(), ChangeMask::all(), SinkKind::Rest, &mut buf).unwrap();
        assert_eq!(len, buf.len());
        assert!(len > 0);
    }

    #[test]
    fn test_overflow_leaves_buffer_empty() {
        let mut buf = PayloadBuf::with_capacity(32);
        assert!(render(&reading(), ChangeMask::all(), SinkKind::Rest, &mut buf).is_none());
        assert!(buf.is_empty());
        assert!(render(&reading(), ChangeMask::all(), SinkKind::InfluxLine, &mut buf).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_buffer_reused_across_formats() {
        let mut buf = PayloadBuf::with_capacity(8192);
        render(&reading(), ChangeMask::all(), SinkKind::InfluxLine, &mut buf).unwrap();
        let len = render(&reading(), ChangeMask::TEMPERATURE, SinkKind::InfluxLine, &mut buf).unwrap();
        assert_eq!(buf.len(), len);
        assert!(String::from_utf8(buf.as_bytes().to_vec())
            .unwrap()
            .starts_with("temperature,"));
    }
}
