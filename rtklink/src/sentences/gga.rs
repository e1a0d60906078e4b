use super::{field, latitude, longitude, opt_f64, opt_string, opt_u8};

/// GGA fix quality indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum FixQuality {
    Invalid = 0,
    Gps = 1,
    Dgps = 2,
    Pps = 3,
    RtkFixed = 4,
    RtkFloat = 5,
    Estimated = 6,
    Manual = 7,
    Simulation = 8,
}

impl TryFrom<u8> for FixQuality {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Invalid,
            1 => Self::Gps,
            2 => Self::Dgps,
            3 => Self::Pps,
            4 => Self::RtkFixed,
            5 => Self::RtkFloat,
            6 => Self::Estimated,
            7 => Self::Manual,
            8 => Self::Simulation,
            other => return Err(other),
        })
    }
}

impl FixQuality {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Fixed or float carrier-phase solution.
    pub fn is_rtk(self) -> bool {
        matches!(self, Self::RtkFixed | Self::RtkFloat)
    }
}

/// Global Positioning System Fix Data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gga {
    /// UTC time as transmitted, `hhmmss.ss`
    pub time: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fix_quality: Option<FixQuality>,
    pub satellites: Option<u8>,
    pub hdop: Option<f64>,
    /// Altitude above mean sea level, meters
    pub altitude: Option<f64>,
    /// Geoid separation, meters
    pub geoid_separation: Option<f64>,
    /// Age of differential corrections, seconds
    pub dgps_age: Option<f64>,
    pub dgps_station: Option<String>,
}

impl Gga {
    pub(crate) fn decode(fields: &[&str]) -> Self {
        Self {
            time: field(fields, 1).to_string(),
            latitude: latitude(fields, 2),
            longitude: longitude(fields, 4),
            fix_quality: opt_u8(fields, 6).and_then(|q| FixQuality::try_from(q).ok()),
            satellites: opt_u8(fields, 7),
            hdop: opt_f64(fields, 8),
            altitude: opt_f64(fields, 9),
            geoid_separation: opt_f64(fields, 11),
            dgps_age: opt_f64(fields, 13),
            dgps_station: opt_string(fields, 14),
        }
    }

    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}
