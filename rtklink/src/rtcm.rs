//! Frame-level checks for RTCM3 correction data.
//!
//! An RTCM3 frame is laid out as
//! `0xD3 | 6 reserved bits + 10 bit length | payload (length bytes) | CRC-24Q (3 bytes)`,
//! with the first 12 bits of the payload holding the message type. Nothing
//! here interprets message contents.

use crate::constants::{
    RTCM_CRC_SIZE, RTCM_HEADER_SIZE, RTCM_LENGTH_MASK, RTCM_MAX_MESSAGE_LEN,
    RTCM_MIN_MESSAGE_LEN, RTCM_SYNC_CHAR, RTCM_TYPE_HEADER_SIZE, SOURCETABLE_MARKERS,
};

const CRC24Q_POLY: u32 = 0x0186_4cfb;

/// Diagnostic view of the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcmFrameInfo {
    pub preamble: bool,
    /// Payload length from the 10 bit length field
    pub length: Option<u16>,
    pub message_type: Option<u16>,
    /// Parity check, only known once the whole frame is in the buffer
    pub crc_ok: Option<bool>,
}

/// Whether `buf` looks like the start of an RTCM3 frame.
///
/// The preamble must be present; the length field, when available, must be
/// within `[3, 1023]`. Message type and parity never affect the result.
pub fn is_valid(buf: &[u8]) -> bool {
    let info = inspect(buf);
    info.preamble
        && info
            .length
            .map_or(true, |len| (RTCM_MIN_MESSAGE_LEN..=RTCM_MAX_MESSAGE_LEN).contains(&len))
}

/// Best-effort extraction of the frame header fields.
pub fn inspect(buf: &[u8]) -> RtcmFrameInfo {
    let mut info = RtcmFrameInfo::default();
    if buf.first() != Some(&RTCM_SYNC_CHAR) {
        return info;
    }
    info.preamble = true;

    if buf.len() >= RTCM_HEADER_SIZE {
        let length = u16::from_be_bytes([buf[1], buf[2]]) & RTCM_LENGTH_MASK;
        info.length = Some(length);

        let frame_end = RTCM_HEADER_SIZE + usize::from(length);
        if buf.len() >= frame_end + RTCM_CRC_SIZE {
            let expect = u32::from_be_bytes([
                0,
                buf[frame_end],
                buf[frame_end + 1],
                buf[frame_end + 2],
            ]);
            info.crc_ok = Some(crc24q(&buf[..frame_end]) == expect);
        }
    }
    if buf.len() >= RTCM_TYPE_HEADER_SIZE {
        info.message_type = Some((u16::from(buf[3]) << 4) | (u16::from(buf[4] & 0xf0) >> 4));
    }
    info
}

/// A caster that replies with its source table (or a `STR;` record) is
/// waiting for a position report rather than streaming corrections.
pub fn is_sourcetable(buf: &[u8]) -> bool {
    SOURCETABLE_MARKERS
        .iter()
        .any(|marker| buf.windows(marker.len()).any(|window| window == *marker))
}

/// CRC-24Q as used by RTCM3 and SBAS
pub fn crc24q(data: &[u8]) -> u32 {
    let mut crc: u32 = 0;
    for byte in data {
        crc ^= u32::from(*byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24Q_POLY;
            }
        }
    }
    crc & 0x00ff_ffff
}
