use super::{opt_char, opt_f64, opt_u16, opt_u8};

/// Fields 3 to 14 carry the PRNs of the satellites used in the fix
const PRN_FIELDS: core::ops::RangeInclusive<usize> = 3..=14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsaFixType {
    NoFix,
    Fix2D,
    Fix3D,
}

impl GsaFixType {
    fn from_field(value: Option<u8>) -> Option<Self> {
        match value? {
            1 => Some(Self::NoFix),
            2 => Some(Self::Fix2D),
            3 => Some(Self::Fix3D),
            _ => None,
        }
    }
}

/// GNSS DOP and active satellites
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gsa {
    /// `A` automatic or `M` manual 2D/3D selection
    pub mode: Option<char>,
    pub fix_type: Option<GsaFixType>,
    /// Satellites used in the fix for this cycle
    pub prns: Vec<u16>,
    pub pdop: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
}

impl Gsa {
    pub(crate) fn decode(fields: &[&str]) -> Self {
        let prns = PRN_FIELDS
            .filter_map(|idx| opt_u16(fields, idx))
            .filter(|prn| *prn != 0)
            .collect();
        Self {
            mode: opt_char(fields, 1),
            fix_type: GsaFixType::from_field(opt_u8(fields, 2)),
            prns,
            pdop: opt_f64(fields, 15),
            hdop: opt_f64(fields, 16),
            vdop: opt_f64(fields, 17),
        }
    }
}
