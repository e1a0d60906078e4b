use serde::{Deserialize, Serialize};

use crate::sentences::{FixQuality, Gga, Rmc};

/// Most recent fix reported by the receiver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Decimal degrees, six decimal places
    pub latitude: f64,
    /// Decimal degrees, six decimal places
    pub longitude: f64,
    /// Meters above mean sea level
    pub altitude: Option<f64>,
    pub geoid_separation: Option<f64>,
    pub fix_quality: Option<FixQuality>,
    pub satellites_used: Option<u8>,
    pub hdop: Option<f64>,
    /// Knots
    pub speed: Option<f64>,
    /// Degrees true
    pub course: Option<f64>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }
}

/// Holds the current [`Position`], merged from GGA and RMC sentences.
///
/// GGA owns altitude, fix quality, HDOP and satellite count; RMC only moves
/// the coordinates and sets speed and course.
#[derive(Debug, Default)]
pub struct PositionStore {
    current: Option<Position>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Position> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Returns `true` when the stored position changed.
    pub fn apply_gga(&mut self, gga: &Gga) -> bool {
        let (Some(latitude), Some(longitude)) = (gga.latitude, gga.longitude) else {
            return false;
        };
        let position = self
            .current
            .get_or_insert_with(|| Position::new(latitude, longitude));
        position.latitude = latitude;
        position.longitude = longitude;
        position.altitude = gga.altitude;
        position.geoid_separation = gga.geoid_separation;
        position.fix_quality = gga.fix_quality;
        position.hdop = gga.hdop;
        position.satellites_used = gga.satellites;
        true
    }

    /// Returns `true` when the stored position changed.
    pub fn apply_rmc(&mut self, rmc: &Rmc) -> bool {
        if !rmc.is_usable_fix() {
            return false;
        }
        let (Some(latitude), Some(longitude)) = (rmc.latitude, rmc.longitude) else {
            return false;
        };
        let position = self
            .current
            .get_or_insert_with(|| Position::new(latitude, longitude));
        position.latitude = latitude;
        position.longitude = longitude;
        position.speed = rmc.speed;
        position.course = rmc.course;
        true
    }
}
