use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for the correction stream of the current connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcmStats {
    /// Buffers received from the caster, valid or not
    pub messages_received: u64,
    pub bytes_received: u64,
    /// Bytes forwarded to the receiver
    pub bytes_sent: u64,
    pub last_message_time: Option<DateTime<Utc>>,
    /// Seconds since `last_message_time`, filled in when a snapshot is taken
    pub correction_age_seconds: Option<f64>,
    /// Count per RTCM3 message type, diagnostics only
    pub message_type_histogram: BTreeMap<u16, u64>,
}

impl RtcmStats {
    pub(crate) fn record_received(
        &mut self,
        len: usize,
        message_type: Option<u16>,
        at: DateTime<Utc>,
    ) {
        self.messages_received += 1;
        self.bytes_received += len as u64;
        self.last_message_time = Some(at);
        if let Some(message_type) = message_type {
            *self.message_type_histogram.entry(message_type).or_default() += 1;
        }
    }

    pub(crate) fn record_forwarded(&mut self, len: usize) {
        self.bytes_sent += len as u64;
    }

    /// Age of the newest correction data at `now`.
    pub fn correction_age(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_message_time
            .map(|last| (now - last).num_milliseconds().max(0) as f64 / 1000.0)
    }

    /// Copy with `correction_age_seconds` computed at `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Self {
        Self {
            correction_age_seconds: self.correction_age(now),
            ..self.clone()
        }
    }
}
