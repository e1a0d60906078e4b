use super::{field, opt_f64};

/// GNSS pseudorange error statistics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gst {
    pub time: String,
    /// RMS of the standard deviation of the range inputs
    pub rms: Option<f64>,
    /// Error ellipse semi-major axis, meters
    pub std_major: Option<f64>,
    /// Error ellipse semi-minor axis, meters
    pub std_minor: Option<f64>,
    /// Error ellipse orientation, degrees from true north
    pub orientation: Option<f64>,
    pub std_latitude: Option<f64>,
    pub std_longitude: Option<f64>,
    pub std_altitude: Option<f64>,
}

impl Gst {
    pub(crate) fn decode(fields: &[&str]) -> Self {
        Self {
            time: field(fields, 1).to_string(),
            rms: opt_f64(fields, 2),
            std_major: opt_f64(fields, 3),
            std_minor: opt_f64(fields, 4),
            orientation: opt_f64(fields, 5),
            std_latitude: opt_f64(fields, 6),
            std_longitude: opt_f64(fields, 7),
            std_altitude: opt_f64(fields, 8),
        }
    }
}
