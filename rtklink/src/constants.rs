pub const NMEA_SYNC_CHAR: u8 = 0x24; // '$'
pub const NMEA_CHECKSUM_DELIMITER: u8 = 0x2a; // '*'
pub const NMEA_END_CHAR_1: u8 = 0x0d; // '\r' (<CR>)
pub const NMEA_END_CHAR_2: u8 = 0x0a; // '\n' (<LF>)
/// sync (1) + address (5) + '*' (1) + checksum (2)
pub(crate) const NMEA_MIN_SENTENCE_LENGTH: usize = 9;
pub(crate) const NMEA_ADDRESS_LEN: usize = 5; // talker (2) + sentence kind (3)
pub(crate) const NMEA_TALKER_LEN: usize = 2;
/// Upper bound for an unterminated line before it is thrown away.
pub(crate) const NMEA_MAX_BUFFER_SIZE: usize = 4096;

pub const RTCM_SYNC_CHAR: u8 = 0xd3;
pub(crate) const RTCM_HEADER_SIZE: usize = 3; // sync char (1) + length field (2)
pub(crate) const RTCM_CRC_SIZE: usize = 3;
pub(crate) const RTCM_LENGTH_MASK: u16 = 0x03ff; // 10 bits for length (6 bits reserved)
pub(crate) const RTCM_MIN_MESSAGE_LEN: u16 = 3;
pub(crate) const RTCM_MAX_MESSAGE_LEN: u16 = 1023;
pub(crate) const RTCM_TYPE_HEADER_SIZE: usize = 6;

/// Markers a caster puts in its reply when it wants a position before streaming.
pub(crate) const SOURCETABLE_MARKERS: [&[u8]; 2] = [b"SOURCETABLE", b"STR;"];

/// Pre-validated GGA sent when a sentence cannot be built from the current position.
pub const NEUTRAL_GGA: &str =
    "$GPGGA,000000.000,0000.0000000,N,00000.0000000,E,1,08,1.0,0.000,M,0.000,M,,*65\r\n";
