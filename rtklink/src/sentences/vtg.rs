use super::{opt_char, opt_f64};

/// Course over ground and ground speed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vtg {
    pub course_true: Option<f64>,
    pub course_magnetic: Option<f64>,
    pub speed_knots: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub mode: Option<char>,
}

impl Vtg {
    pub(crate) fn decode(fields: &[&str]) -> Self {
        Self {
            course_true: opt_f64(fields, 1),
            course_magnetic: opt_f64(fields, 3),
            speed_knots: opt_f64(fields, 5),
            speed_kmh: opt_f64(fields, 7),
            mode: opt_char(fields, 9),
        }
    }
}
