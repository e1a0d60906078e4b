//! Typed NMEA-0183 sentences.
//!
//! Dispatch is keyed by the three-letter sentence kind that follows the
//! two-letter talker ID, so `$GPGGA`, `$GNGGA`, `$BDGGA` and `$GLGGA` all
//! decode to [`Sentence::Gga`].

use core::fmt;

use serde::Serialize;

pub mod gga;
pub mod gsa;
pub mod gsv;
pub mod gst;
pub mod rmc;
pub mod vtg;

pub use gga::{FixQuality, Gga};
pub use gsa::{Gsa, GsaFixType};
pub use gsv::{Gsv, GsvSatellite};
pub use gst::Gst;
pub use rmc::{Rmc, RmcStatus};
pub use vtg::Vtg;

use crate::constants::{NMEA_ADDRESS_LEN, NMEA_TALKER_LEN};

/// Talker prefix of a sentence address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Talker {
    /// `GP`
    Gps,
    /// `GN`, combined constellations
    Gnss,
    /// `BD`
    Beidou,
    /// `GL`
    Glonass,
    /// `GA`
    Galileo,
    Other(String),
}

impl Talker {
    pub fn from_id(id: &str) -> Self {
        match id {
            "GP" => Self::Gps,
            "GN" => Self::Gnss,
            "BD" => Self::Beidou,
            "GL" => Self::Glonass,
            "GA" => Self::Galileo,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Normalised sentence kind, independent of the talker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentenceKind {
    Gga,
    Gsa,
    Gsv,
    Rmc,
    Gst,
    Vtg,
    Unknown,
}

impl SentenceKind {
    /// Look up the kind for a full address such as `GNGSA`.
    pub fn from_address(address: &str) -> Self {
        if address.len() != NMEA_ADDRESS_LEN || !address.is_ascii() {
            return Self::Unknown;
        }
        match &address[NMEA_TALKER_LEN..] {
            "GGA" => Self::Gga,
            "GSA" => Self::Gsa,
            "GSV" => Self::Gsv,
            "RMC" => Self::Rmc,
            "GST" => Self::Gst,
            "VTG" => Self::Vtg,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gga => "GGA",
            Self::Gsa => "GSA",
            Self::Gsv => "GSV",
            Self::Rmc => "RMC",
            Self::Gst => "GST",
            Self::Vtg => "VTG",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SentenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sentence whose kind has no dedicated decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unknown {
    /// Address with the talker prefix removed, e.g. `ZDA` for `$GPZDA`.
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Gga(Gga),
    Gsa(Gsa),
    Gsv(Gsv),
    Rmc(Rmc),
    Gst(Gst),
    Vtg(Vtg),
    Unknown(Unknown),
}

impl Sentence {
    /// Decode the comma separated fields of a checksum-validated sentence body.
    /// Field 0 is the address.
    pub(crate) fn decode(fields: &[&str]) -> Self {
        let address = field(fields, 0);
        match SentenceKind::from_address(address) {
            SentenceKind::Gga => Self::Gga(Gga::decode(fields)),
            SentenceKind::Gsa => Self::Gsa(Gsa::decode(fields)),
            SentenceKind::Gsv => Self::Gsv(Gsv::decode(fields)),
            SentenceKind::Rmc => Self::Rmc(Rmc::decode(fields)),
            SentenceKind::Gst => Self::Gst(Gst::decode(fields)),
            SentenceKind::Vtg => Self::Vtg(Vtg::decode(fields)),
            SentenceKind::Unknown => Self::Unknown(Unknown {
                kind: address
                    .get(NMEA_TALKER_LEN..)
                    .unwrap_or(address)
                    .to_string(),
            }),
        }
    }

    pub fn kind(&self) -> SentenceKind {
        match self {
            Self::Gga(_) => SentenceKind::Gga,
            Self::Gsa(_) => SentenceKind::Gsa,
            Self::Gsv(_) => SentenceKind::Gsv,
            Self::Rmc(_) => SentenceKind::Rmc,
            Self::Gst(_) => SentenceKind::Gst,
            Self::Vtg(_) => SentenceKind::Vtg,
            Self::Unknown(_) => SentenceKind::Unknown,
        }
    }
}

/// A decoded sentence together with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSentence {
    pub talker: Talker,
    pub sentence: Sentence,
    /// Original sentence without the line terminator.
    pub raw: String,
    /// Sentences per second, from the gap to the previous accepted sentence.
    pub data_rate: Option<f64>,
}

impl ParsedSentence {
    pub fn kind(&self) -> SentenceKind {
        self.sentence.kind()
    }
}

pub(crate) fn field<'a>(fields: &[&'a str], idx: usize) -> &'a str {
    fields.get(idx).copied().unwrap_or_default()
}

pub(crate) fn opt_string(fields: &[&str], idx: usize) -> Option<String> {
    let value = field(fields, idx);
    (!value.is_empty()).then(|| value.to_string())
}

pub(crate) fn opt_char(fields: &[&str], idx: usize) -> Option<char> {
    field(fields, idx).chars().next()
}

pub(crate) fn opt_f64(fields: &[&str], idx: usize) -> Option<f64> {
    field(fields, idx).parse().ok().filter(|v: &f64| v.is_finite())
}

pub(crate) fn opt_u8(fields: &[&str], idx: usize) -> Option<u8> {
    field(fields, idx).parse().ok()
}

pub(crate) fn opt_u16(fields: &[&str], idx: usize) -> Option<u16> {
    field(fields, idx).parse().ok()
}

pub(crate) fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Convert `ddmm.mmmm` (or `dddmm.mmmm` with `degree_digits = 3`) plus a
/// hemisphere letter to signed decimal degrees rounded to six places.
fn coordinate(value: &str, hemisphere: &str, degree_digits: usize, negative: &str) -> Option<f64> {
    if value.len() <= degree_digits || !value.is_ascii() {
        return None;
    }
    let degrees: f64 = value[..degree_digits].parse().ok()?;
    let minutes: f64 = value[degree_digits..].parse().ok()?;
    let decimal = round6(degrees + minutes / 60.0);
    Some(if hemisphere == negative { -decimal } else { decimal })
}

pub(crate) fn latitude(fields: &[&str], idx: usize) -> Option<f64> {
    coordinate(field(fields, idx), field(fields, idx + 1), 2, "S")
}

pub(crate) fn longitude(fields: &[&str], idx: usize) -> Option<f64> {
    coordinate(field(fields, idx), field(fields, idx + 1), 3, "W")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_ignores_talker() {
        for address in ["GPGGA", "GNGGA", "BDGGA", "GLGGA", "GAGGA"] {
            assert_eq!(SentenceKind::from_address(address), SentenceKind::Gga);
        }
        assert_eq!(SentenceKind::from_address("GPZDA"), SentenceKind::Unknown);
        assert_eq!(SentenceKind::from_address("PUBX"), SentenceKind::Unknown);
    }

    #[test]
    fn unknown_strips_talker() {
        match Sentence::decode(&["GNZDA", "120000.00", "01", "01", "2024"]) {
            Sentence::Unknown(unknown) => assert_eq!(unknown.kind, "ZDA"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn coordinates() {
        let fields = ["", "5321.6802", "N", "00630.3372", "W"];
        assert_eq!(latitude(&fields, 1), Some(53.361337));
        assert_eq!(longitude(&fields, 3), Some(-6.50562));

        let fields = ["", "3345.1234", "S", "15112.5000", "E"];
        assert_eq!(latitude(&fields, 1), Some(-33.752057));
        assert_eq!(longitude(&fields, 3), Some(151.208333));
    }

    #[test]
    fn empty_coordinates_are_absent() {
        let fields = ["", "", "", "", ""];
        assert_eq!(latitude(&fields, 1), None);
        assert_eq!(longitude(&fields, 3), None);
        assert_eq!(latitude(&["", "53"], 1), None);
    }

    #[test]
    fn numeric_helpers() {
        let fields = ["X", "1.5", "", "abc", "300", "NaN"];
        assert_eq!(opt_f64(&fields, 1), Some(1.5));
        assert_eq!(opt_f64(&fields, 2), None);
        assert_eq!(opt_f64(&fields, 3), None);
        assert_eq!(opt_f64(&fields, 5), None);
        assert_eq!(opt_u8(&fields, 4), None);
        assert_eq!(opt_u16(&fields, 4), Some(300));
        assert_eq!(opt_f64(&fields, 42), None);
    }
}
