use chrono::NaiveDate;

use super::{field, latitude, longitude, opt_char, opt_f64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmcStatus {
    /// `A`
    Active,
    /// `V`
    Void,
}

/// Recommended minimum navigation data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rmc {
    /// UTC time as transmitted, `hhmmss.ss`
    pub time: String,
    pub status: Option<RmcStatus>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Speed over ground, knots
    pub speed: Option<f64>,
    /// Course over ground, degrees true
    pub course: Option<f64>,
    pub date: Option<NaiveDate>,
    /// Degrees, negative when west
    pub magnetic_variation: Option<f64>,
    pub mode: Option<char>,
}

impl Rmc {
    pub(crate) fn decode(fields: &[&str]) -> Self {
        let status = match field(fields, 2) {
            "A" => Some(RmcStatus::Active),
            "V" => Some(RmcStatus::Void),
            _ => None,
        };
        let magnetic_variation = opt_f64(fields, 10).map(|variation| {
            if field(fields, 11) == "W" {
                -variation
            } else {
                variation
            }
        });
        Self {
            time: field(fields, 1).to_string(),
            status,
            latitude: latitude(fields, 3),
            longitude: longitude(fields, 5),
            speed: opt_f64(fields, 7),
            course: opt_f64(fields, 8),
            date: parse_date(field(fields, 9)),
            magnetic_variation,
            mode: opt_char(fields, 12),
        }
    }

    /// Only an active fix with both coordinates may move the stored position.
    pub fn is_usable_fix(&self) -> bool {
        self.status == Some(RmcStatus::Active)
            && self.latitude.is_some()
            && self.longitude.is_some()
    }
}

/// `ddmmyy`, assuming the 21st century
fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 6 || !value.is_ascii() {
        return None;
    }
    let day: u32 = value[0..2].parse().ok()?;
    let month: u32 = value[2..4].parse().ok()?;
    let year: i32 = value[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}
