//! GGA generation for position reports sent to the caster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    constants::NEUTRAL_GGA,
    parser::{checksum::checksum, validate},
    position::Position,
};

/// GGA sentences carry 15 comma separated fields including the address
const GGA_FIELD_COUNT: usize = 15;
const GGA_PREFIX: &str = "$GPGGA";

/// Values substituted for fields the receiver has not reported.
///
/// Many casters only start streaming once they see a plausible fix, which is
/// why quality and satellite count are never sent as blanks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GgaDefaults {
    /// Default `1` (GPS fix)
    pub fix_quality: u8,
    /// Default `8`
    pub satellites: u8,
    /// Default `1.0`
    pub hdop: f64,
}

impl Default for GgaDefaults {
    fn default() -> Self {
        Self {
            fix_quality: 1,
            satellites: 8,
            hdop: 1.0,
        }
    }
}

/// Renders a [`Position`] as a `$GPGGA` sentence.
#[derive(Debug, Clone, Default)]
pub struct GgaEncoder {
    defaults: GgaDefaults,
}

impl GgaEncoder {
    pub fn new(defaults: GgaDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &GgaDefaults {
        &self.defaults
    }

    /// Encode `position` stamped with the current UTC time.
    pub fn encode(&self, position: &Position) -> String {
        self.encode_at(position, Utc::now())
    }

    /// Encode `position` stamped with `time`. Falls back to [`NEUTRAL_GGA`]
    /// if the result does not pass validation.
    pub fn encode_at(&self, position: &Position, time: DateTime<Utc>) -> String {
        match self.build(position, time) {
            Some(sentence) if is_valid_gga(&sentence) => sentence,
            _ => {
                warn!(?position, "could not build a valid GGA, sending neutral sentence");
                NEUTRAL_GGA.to_string()
            },
        }
    }

    fn build(&self, position: &Position, time: DateTime<Utc>) -> Option<String> {
        let (lat, lat_hemisphere) = coordinate(position.latitude, 90.0, 2, ('N', 'S'))?;
        let (lon, lon_hemisphere) = coordinate(position.longitude, 180.0, 3, ('E', 'W'))?;
        let quality = position
            .fix_quality
            .map(|q| q.as_u8())
            .unwrap_or(self.defaults.fix_quality);
        let satellites = position.satellites_used.unwrap_or(self.defaults.satellites);
        let hdop = position.hdop.unwrap_or(self.defaults.hdop);
        let altitude = position.altitude.unwrap_or_default();
        let geoid = position.geoid_separation.unwrap_or_default();
        if !(hdop.is_finite() && altitude.is_finite() && geoid.is_finite()) {
            return None;
        }

        let body = format!(
            "GPGGA,{},{lat},{lat_hemisphere},{lon},{lon_hemisphere},\
             {quality},{satellites:02},{hdop:.1},{altitude:.3},M,{geoid:.3},M,,",
            time.format("%H%M%S%.3f"),
        );
        Some(format!("${body}*{:02X}\r\n", checksum(body.as_bytes())))
    }
}

/// Expand decimal degrees to `ddmm.mmmmmmm` / `dddmm.mmmmmmm`.
fn coordinate(
    value: f64,
    limit: f64,
    degree_digits: usize,
    hemispheres: (char, char),
) -> Option<(String, char)> {
    if !value.is_finite() || value.abs() > limit {
        return None;
    }
    let hemisphere = if value < 0.0 {
        hemispheres.1
    } else {
        hemispheres.0
    };
    let abs = value.abs();
    let mut degrees = abs.trunc();
    let mut minutes = ((abs - degrees) * 60.0 * 1e7).round() / 1e7;
    if minutes >= 60.0 {
        degrees += 1.0;
        minutes -= 60.0;
    }
    Some((
        format!(
            "{:0width$}{:010.7}",
            degrees as u32,
            minutes,
            width = degree_digits
        ),
        hemisphere,
    ))
}

/// Same structural checks the decoder applies to an incoming GGA: prefix,
/// checksum and field count.
pub fn is_valid_gga(sentence: &str) -> bool {
    let line = sentence.trim_end_matches(['\r', '\n']);
    if !line.starts_with(GGA_PREFIX) {
        return false;
    }
    match validate(line.as_bytes()) {
        Ok(body) => body.split(',').count() >= GGA_FIELD_COUNT,
        Err(_) => false,
    }
}
