use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sentences::{Gsa, Gsv};

/// Per-satellite state assembled from GSV and GSA sentences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatelliteRecord {
    pub prn: u16,
    pub elevation: Option<f64>,
    pub azimuth: Option<f64>,
    /// dB-Hz
    pub snr: Option<f64>,
    /// Listed in the latest GSA active-satellite set
    pub used: bool,
}

/// Assembles satellites-in-view across a multi-message GSV group.
///
/// The first message of a group clears the working table; the table is
/// published as a snapshot only once the last message of the group arrived.
/// Messages must arrive in order: a continuation that does not follow the
/// previous message of the same group discards the group.
#[derive(Debug, Default)]
pub struct SatelliteTracker {
    table: BTreeMap<u16, SatelliteRecord>,
    used: BTreeSet<u16>,
    snapshot: Vec<SatelliteRecord>,
    /// `(total_messages, next message_number)` of the group being assembled
    expected: Option<(u8, u8)>,
    complete: bool,
}

impl SatelliteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this message completed its group.
    pub fn apply_gsv(&mut self, gsv: &Gsv) -> bool {
        if gsv.is_first() {
            self.table.clear();
            self.complete = false;
        } else if self.expected != Some((gsv.total_messages, gsv.message_number)) {
            if self.expected.is_some() {
                debug!(
                    message = gsv.message_number,
                    total = gsv.total_messages,
                    "GSV group interrupted, discarding it"
                );
            }
            self.table.clear();
            self.expected = None;
            return false;
        }
        self.expected = Some((gsv.total_messages, gsv.message_number.saturating_add(1)));

        for sat in &gsv.satellites {
            self.table.insert(
                sat.prn,
                SatelliteRecord {
                    prn: sat.prn,
                    elevation: sat.elevation,
                    azimuth: sat.azimuth,
                    snr: sat.snr,
                    used: self.used.contains(&sat.prn),
                },
            );
        }
        if gsv.is_last() {
            self.complete = true;
            self.snapshot = std::mem::take(&mut self.table).into_values().collect();
            self.expected = None;
            return true;
        }
        false
    }

    /// Replace the active set. Satellites missing from this GSA dropped out
    /// of the fix, so every previous `used` flag is cleared first.
    pub fn apply_gsa(&mut self, gsa: &Gsa) {
        self.used = gsa.prns.iter().copied().collect();
        for record in self.table.values_mut().chain(self.snapshot.iter_mut()) {
            record.used = self.used.contains(&record.prn);
        }
    }

    /// Satellites of the last completed GSV group.
    pub fn satellites(&self) -> &[SatelliteRecord] {
        &self.snapshot
    }

    /// Whether the last group finished and no newer one is being assembled.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn used_count(&self) -> usize {
        self.snapshot.iter().filter(|record| record.used).count()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
