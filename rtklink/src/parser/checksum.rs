use crate::ParserError;

/// NMEA XOR checksum calculator supporting both streaming and single-shot validation
#[derive(Default, Debug, Clone, Copy)]
pub(crate) struct NmeaChecksumCalc {
    value: u8,
}

impl NmeaChecksumCalc {
    pub(crate) const fn new() -> Self {
        Self { value: 0 }
    }

    /// Update checksum with new bytes
    pub(crate) const fn update(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            self.value ^= bytes[i];
            i += 1;
        }
    }

    /// Get the current checksum result
    pub(crate) const fn result(self) -> u8 {
        self.value
    }

    /// Validate checksum against the value transmitted after `*`
    pub(crate) const fn validate_result(self, received: u8) -> Result<(), ParserError> {
        if self.value == received {
            Ok(())
        } else {
            Err(ParserError::InvalidChecksum {
                expect: received,
                got: self.value,
            })
        }
    }
}

/// XOR of every byte of `body`, where `body` is the text between `$` and `*`.
pub fn checksum(body: &[u8]) -> u8 {
    let mut calc = NmeaChecksumCalc::new();
    calc.update(body);
    calc.result()
}

/// Parse the two hex digits following `*`.
pub(crate) fn parse_checksum_field(field: &[u8]) -> Result<u8, ParserError> {
    if field.len() < 2 || !field[..2].iter().all(u8::is_ascii_hexdigit) {
        return Err(ParserError::MalformedChecksum);
    }
    let digits = core::str::from_utf8(&field[..2]).map_err(|_| ParserError::MalformedChecksum)?;
    u8::from_str_radix(digits, 16).map_err(|_| ParserError::MalformedChecksum)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn xor_of_known_sentence() {
        let body = b"GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,";
        assert_eq!(checksum(body), 0x76);
    }

    #[test]
    fn streaming_matches_single_shot() {
        let body = b"GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
        let mut calc = NmeaChecksumCalc::new();
        for chunk in body.chunks(7) {
            calc.update(chunk);
        }
        assert_eq!(calc.result(), checksum(body));
        assert_eq!(calc.result(), 0x6A);
    }

    #[test]
    fn validate_reports_both_values() {
        let mut calc = NmeaChecksumCalc::new();
        calc.update(b"AB");
        assert_eq!(
            calc.validate_result(0x10),
            Err(ParserError::InvalidChecksum {
                expect: 0x10,
                got: b'A' ^ b'B'
            })
        );
    }

    #[test]
    fn checksum_field_parsing() {
        assert_eq!(parse_checksum_field(b"6a"), Ok(0x6a));
        assert_eq!(parse_checksum_field(b"FF\r"), Ok(0xff));
        assert_eq!(parse_checksum_field(b"F"), Err(ParserError::MalformedChecksum));
        assert_eq!(parse_checksum_field(b"ZZ"), Err(ParserError::MalformedChecksum));
        assert_eq!(parse_checksum_field(b"+5"), Err(ParserError::MalformedChecksum));
        assert_eq!(parse_checksum_field(b"-1"), Err(ParserError::MalformedChecksum));
    }
}
