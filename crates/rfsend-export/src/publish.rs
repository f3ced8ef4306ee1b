//! The per-reading publish decision and its bookkeeping.

use tracing::{debug, error, info, trace, warn};

use rfsend_core::{ChangeMask, DecodedReading, SinkKind};

use crate::buffer::PayloadBuf;
use crate::response::ResponseSink;
use crate::serialize;
use crate::transport::{PublishOutcome, TransportClient};

/// Why a reading was not put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Failed its checksum and the gate does not allow it through.
    Invalid,
    /// Nothing changed and only changes are published.
    Unchanged,
    /// The serializer produced no payload.
    EmptyPayload,
}

/// Gate behavior options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublisherOptions {
    /// Publish readings even when nothing changed. Unchanged readings go
    /// out with every field selected.
    pub send_all: bool,
}

/// Counters reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub failed: u64,
    pub skipped_invalid: u64,
    pub skipped_unchanged: u64,
    pub skipped_empty: u64,
}

/// Decide the effective field selection for a reading, or the reason not
/// to publish it.
///
/// Invalid readings are only publishable in send-all mode and only to a
/// REST sink: the JSON document carries the validity flag, the line
/// protocol has no slot for it, so invalid data never reaches InfluxDB.
/// An empty mask in send-all mode widens to the full selection.
fn effective_mask(
    reading: &DecodedReading,
    mask: ChangeMask,
    send_all: bool,
    kind: SinkKind,
) -> Result<ChangeMask, SkipReason> {
    if !reading.valid && (!send_all || kind == SinkKind::InfluxLine) {
        return Err(SkipReason::Invalid);
    }
    if !mask.is_empty() {
        return Ok(mask);
    }
    if send_all {
        Ok(ChangeMask::all())
    } else {
        Err(SkipReason::Unchanged)
    }
}

/// Gate, serialize and transmit readings one at a time.
///
/// Owns the payload and response buffers and the transport handle; both
/// buffers are reused across publishes. Strictly sequential by
/// construction: `publish` takes `&mut self` and is awaited to completion
/// before the next reading can enter.
pub struct Publisher {
    transport: TransportClient,
    options: PublisherOptions,
    payload: PayloadBuf,
    response: ResponseSink,
    stats: PublishStats,
    last_outcome: Option<PublishOutcome>,
}

impl Publisher {
    pub fn new(
        transport: TransportClient,
        options: PublisherOptions,
        payload_capacity: usize,
        response_capacity: usize,
    ) -> Self {
        Self {
            transport,
            options,
            payload: PayloadBuf::with_capacity(payload_capacity),
            response: ResponseSink::with_capacity(response_capacity),
            stats: PublishStats::default(),
            last_outcome: None,
        }
    }

    /// Decide, serialize and transmit one reading.
    ///
    /// Returns whether a network attempt was made. The attempt's own
    /// result lands in the log, the counters, and `last_outcome`.
    pub async fn publish(&mut self, reading: &DecodedReading, mask: ChangeMask) -> bool {
        let kind = self.transport.target().kind;
        let mask = match effective_mask(reading, mask, self.options.send_all, kind) {
            Ok(mask) => mask,
            Err(reason) => {
                self.note_skip(reading, reason);
                return false;
            }
        };

        let len = match serialize::render(reading, mask, kind, &mut self.payload) {
            Some(len) => len,
            None => {
                self.note_skip(reading, SkipReason::EmptyPayload);
                return false;
            }
        };
        trace!(
            sensor = %reading.key(),
            mask = %mask,
            bytes = len,
            payload = %String::from_utf8_lossy(self.payload.as_bytes()),
            "payload ready"
        );

        let outcome = self
            .transport
            .send(self.payload.as_bytes(), &mut self.response)
            .await;
        self.report(reading, &outcome);
        self.last_outcome = Some(outcome);
        true
    }

    /// Outcome of the most recent network attempt, if any was made.
    pub fn last_outcome(&self) -> Option<&PublishOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    fn note_skip(&mut self, reading: &DecodedReading, reason: SkipReason) {
        match reason {
            SkipReason::Invalid => {
                self.stats.skipped_invalid += 1;
                info!(sensor = %reading.key(), "data is not valid and is not sent");
            }
            SkipReason::Unchanged => {
                self.stats.skipped_unchanged += 1;
                info!(sensor = %reading.key(), "data is not changed and is not sent");
            }
            SkipReason::EmptyPayload => {
                self.stats.skipped_empty += 1;
                warn!(sensor = %reading.key(), "no payload was generated, nothing sent");
            }
        }
    }

    fn report(&mut self, reading: &DecodedReading, outcome: &PublishOutcome) {
        if outcome.success {
            self.stats.published += 1;
            debug!(sensor = %reading.key(), status = outcome.http_status, "published");
            if !self.response.is_empty() {
                trace!(body = %self.response.as_text().trim(), "server response");
            }
            return;
        }
        self.stats.failed += 1;
        match &outcome.transport_error {
            Some(err) if outcome.http_status == 0 => {
                error!(sensor = %reading.key(), error = %err, "failed to connect to server");
            }
            Some(err) => {
                error!(
                    sensor = %reading.key(),
                    status = outcome.http_status,
                    error = %err,
                    "response transfer aborted"
                );
            }
            None => {
                let body = self.response.as_text();
                let body = body.trim();
                if body.is_empty() {
                    error!(
                        sensor = %reading.key(),
                        status = outcome.http_status,
                        expected = self.transport.target().kind.expected_status(),
                        "unexpected response status"
                    );
                } else {
                    error!(
                        sensor = %reading.key(),
                        status = outcome.http_status,
                        expected = self.transport.target().kind.expected_status(),
                        body = %body,
                        "unexpected response status"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rfsend_core::Celsius;

    fn reading(valid: bool) -> DecodedReading {
        DecodedReading {
            time: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            model: "F007TH".to_string(),
            channel: 2,
            rolling_code: 42,
            temperature: Some(Celsius(215)),
            humidity: Some(47),
            battery_ok: Some(true),
            valid,
            decode_status: 0,
        }
    }

    #[test]
    fn test_gate_passes_changed_valid_reading() {
        let mask = ChangeMask::TEMPERATURE;
        assert_eq!(
            effective_mask(&reading(true), mask, false, SinkKind::Rest),
            Ok(mask)
        );
        assert_eq!(
            effective_mask(&reading(true), mask, false, SinkKind::InfluxLine),
            Ok(mask)
        );
    }

    #[test]
    fn test_gate_skips_unchanged_in_changes_only_mode() {
        assert_eq!(
            effective_mask(&reading(true), ChangeMask::empty(), false, SinkKind::Rest),
            Err(SkipReason::Unchanged)
        );
    }

    #[test]
    fn test_gate_widens_unchanged_in_send_all_mode() {
        assert_eq!(
            effective_mask(&reading(true), ChangeMask::empty(), true, SinkKind::Rest),
            Ok(ChangeMask::all())
        );
        assert_eq!(
            effective_mask(&reading(true), ChangeMask::empty(), true, SinkKind::InfluxLine),
            Ok(ChangeMask::all())
        );
    }

    #[test]
    fn test_gate_keeps_computed_mask_in_send_all_mode() {
        let mask = ChangeMask::HUMIDITY;
        assert_eq!(
            effective_mask(&reading(true), mask, true, SinkKind::Rest),
            Ok(mask)
        );
    }

    #[test]
    fn test_gate_skips_invalid_in_changes_only_mode() {
        assert_eq!(
            effective_mask(&reading(false), ChangeMask::empty(), false, SinkKind::Rest),
            Err(SkipReason::Invalid)
        );
    }

    #[test]
    fn test_gate_sends_invalid_to_rest_in_send_all_mode() {
        assert_eq!(
            effective_mask(&reading(false), ChangeMask::empty(), true, SinkKind::Rest),
            Ok(ChangeMask::all())
        );
    }

    #[test]
    fn test_gate_never_sends_invalid_to_influx() {
        assert_eq!(
            effective_mask(&reading(false), ChangeMask::empty(), true, SinkKind::InfluxLine),
            Err(SkipReason::Invalid)
        );
        // even a caller-supplied mask does not get invalid data through
        assert_eq!(
            effective_mask(&reading(false), ChangeMask::all(), true, SinkKind::InfluxLine),
            Err(SkipReason::Invalid)
        );
    }
}
