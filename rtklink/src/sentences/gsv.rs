use super::{opt_f64, opt_u16, opt_u8};

/// Satellite blocks start at field 4, four fields each
const FIRST_SATELLITE_FIELD: usize = 4;
const SATELLITE_FIELDS: usize = 4;
const MAX_SATELLITES_PER_MESSAGE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GsvSatellite {
    pub prn: u16,
    /// Degrees above the horizon
    pub elevation: Option<f64>,
    /// Degrees from true north
    pub azimuth: Option<f64>,
    /// dB-Hz, absent when the satellite is not tracked
    pub snr: Option<f64>,
}

/// GNSS satellites in view, one message of a group
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gsv {
    pub total_messages: u8,
    pub message_number: u8,
    pub satellites_in_view: u16,
    pub satellites: Vec<GsvSatellite>,
}

impl Gsv {
    pub(crate) fn decode(fields: &[&str]) -> Self {
        let mut satellites = Vec::with_capacity(MAX_SATELLITES_PER_MESSAGE);
        for i in 0..MAX_SATELLITES_PER_MESSAGE {
            let base = FIRST_SATELLITE_FIELD + SATELLITE_FIELDS * i;
            // A partial block is the NMEA 4.1 signal ID, not a satellite
            if base + SATELLITE_FIELDS > fields.len() {
                break;
            }
            let Some(prn) = opt_u16(fields, base).filter(|prn| *prn != 0) else {
                continue;
            };
            satellites.push(GsvSatellite {
                prn,
                elevation: opt_f64(fields, base + 1),
                azimuth: opt_f64(fields, base + 2),
                snr: opt_f64(fields, base + 3),
            });
        }
        Self {
            total_messages: opt_u8(fields, 1).unwrap_or_default(),
            message_number: opt_u8(fields, 2).unwrap_or_default(),
            satellites_in_view: opt_u16(fields, 3).unwrap_or_default(),
            satellites,
        }
    }

    pub fn is_first(&self) -> bool {
        self.message_number == 1
    }

    pub fn is_last(&self) -> bool {
        self.message_number != 0 && self.message_number == self.total_messages
    }
}
