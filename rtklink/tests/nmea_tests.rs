use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rtklink::{
    encoder::is_valid_gga,
    sentences::{FixQuality, Gga},
    GgaEncoder, NmeaDecoder, Parser, ParserError, Position, Sentence, SentenceKind,
};

const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";
const GSV_1: &str = "$GPGSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*75\r\n";
const GSV_2: &str = "$GPGSV,2,2,08,15,30,050,47,19,10,110,40,24,45,270,43,25,05,020,*78\r\n";

fn decode_one(line: &str) -> Sentence {
    let mut decoder = NmeaDecoder::new();
    let mut out = decoder.feed(line);
    assert_eq!(out.len(), 1, "expected one sentence from {line:?}");
    out.remove(0).sentence
}

fn flip_bit(line: &str, index: usize, bit: u8) -> Vec<u8> {
    let mut bytes = line.as_bytes().to_vec();
    bytes[index] ^= 1 << bit;
    bytes
}

#[test]
fn test_gga_reference_sentence() {
    let gga = match decode_one(GGA) {
        Sentence::Gga(gga) => gga,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(
        gga,
        Gga {
            time: "123519".into(),
            latitude: Some(48.1173),
            longitude: Some(11.516667),
            fix_quality: Some(FixQuality::Gps),
            satellites: Some(8),
            hdop: Some(0.9),
            altitude: Some(545.4),
            geoid_separation: Some(46.9),
            dgps_age: None,
            dgps_station: None,
        }
    );
}

#[test]
fn test_position_merges_gga_and_rmc() {
    let mut decoder = NmeaDecoder::new();
    decoder.feed(GGA);
    decoder.feed(RMC);
    let position = decoder.position().unwrap();
    assert_eq!(position.latitude, 48.1173);
    assert_eq!(position.altitude, Some(545.4));
    assert_eq!(position.satellites_used, Some(8));
    assert_eq!(position.speed, Some(22.4));
    assert_eq!(position.course, Some(84.4));
}

#[test]
fn test_byte_by_byte_feeding() {
    let stream = [GGA, RMC, GSV_1, GSV_2].concat();
    let mut decoder = NmeaDecoder::new();
    let mut kinds = Vec::new();
    for byte in stream.as_bytes() {
        kinds.extend(decoder.feed([*byte]).iter().map(|p| p.kind()));
    }
    assert_eq!(
        kinds,
        vec![
            SentenceKind::Gga,
            SentenceKind::Rmc,
            SentenceKind::Gsv,
            SentenceKind::Gsv
        ]
    );
    assert_eq!(decoder.satellites().len(), 8);
}

#[test]
fn test_garbage_between_sentences() {
    let stream = format!("\x00\x7f junk {GGA}$GP,,,\r\n{RMC}");
    let mut decoder = NmeaDecoder::new();
    let out = decoder.feed(stream);
    assert_eq!(out.len(), 2);
    assert_eq!(decoder.stats().total_sentences, 2);
}

#[test]
fn test_checksum_reported_by_parser() {
    let mut parser = Parser::default();
    let mut it = parser.consume(b"$GPGGA,1*00\r\n");
    match it.next() {
        Some(Err(ParserError::InvalidChecksum { expect, got })) => {
            assert_eq!(expect, 0x00);
            assert_eq!(got, 0x4b);
        },
        other => panic!("unexpected {other:?}"),
    }
    assert!(it.next().is_none());
}

#[test]
fn test_gsv_group_replaces_previous_table() {
    let mut decoder = NmeaDecoder::new();
    decoder.feed([GSV_1, GSV_2].concat());
    assert_eq!(decoder.satellites().len(), 8);

    // a partial group keeps the last complete snapshot
    decoder.feed(GSV_1);
    assert_eq!(decoder.satellites().len(), 8);

    decoder.feed("$GPGSV,1,1,01,07,79,048,42*4B\r\n");
    let prns: Vec<u16> = decoder.satellites().iter().map(|s| s.prn).collect();
    assert_eq!(prns, vec![7]);
}

#[test]
fn test_gsv_continuation_without_first_message_is_ignored() {
    let mut decoder = NmeaDecoder::new();
    let mut satellites = decoder.events().satellites.subscribe();
    decoder.feed([GSV_1, GSV_2].concat());
    assert_eq!(satellites.try_recv().unwrap().satellites.len(), 8);

    decoder.feed("$GPGSV,2,2,05,30,45,100,38*44\r\n");
    assert!(satellites.try_recv().is_err());
    let prns: Vec<u16> = decoder.satellites().iter().map(|s| s.prn).collect();
    assert_eq!(prns, vec![1, 2, 12, 14, 15, 19, 24, 25]);
}

#[test]
fn test_encoded_gga_is_accepted_by_decoder() {
    let encoder = GgaEncoder::default();
    let time = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap();
    let sentence = encoder.encode_at(&Position::new(-33.865143, 151.2099), time);
    assert!(sentence.starts_with("$GPGGA,102030.000,3351.9085800,S,15112.5940000,E,"));
    assert!(is_valid_gga(&sentence));

    let mut decoder = NmeaDecoder::new();
    decoder.feed(&sentence);
    let position = decoder.position().unwrap();
    assert_eq!(position.latitude, -33.865143);
    assert_eq!(position.longitude, 151.2099);
}

proptest! {
    #[test]
    fn test_any_flipped_bit_in_body_is_rejected(index in 1usize..GGA.len() - 5, bit in 0u8..7) {
        let corrupted = flip_bit(GGA, index, bit);
        let mut decoder = NmeaDecoder::new();
        let out = decoder.feed(&corrupted);
        prop_assert!(out.iter().all(|p| p.kind() != SentenceKind::Gga));
        prop_assert!(decoder.position().is_none());
    }

    #[test]
    fn test_encode_decode_round_trip(
        latitude in -89.999_999f64..89.999_999,
        longitude in -179.999_999f64..179.999_999,
        altitude in -400.0f64..9000.0,
    ) {
        let encoder = GgaEncoder::default();
        let position = Position {
            altitude: Some(altitude),
            ..Position::new(latitude, longitude)
        };
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let sentence = encoder.encode_at(&position, time);
        prop_assert!(is_valid_gga(&sentence));

        let mut decoder = NmeaDecoder::new();
        decoder.feed(&sentence);
        let decoded = decoder.position().cloned().unwrap();
        prop_assert!((decoded.latitude - latitude).abs() <= 1e-6);
        prop_assert!((decoded.longitude - longitude).abs() <= 1e-6);
        prop_assert!((decoded.altitude.unwrap() - altitude).abs() <= 1e-3);
    }

    #[test]
    fn test_arbitrary_input_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut decoder = NmeaDecoder::new();
        let out = decoder.feed(&data);
        prop_assert_eq!(out.len() as u64, decoder.stats().total_sentences);
    }
}
