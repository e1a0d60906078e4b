use std::time::Instant;

use crate::{
    constants::{
        NMEA_ADDRESS_LEN, NMEA_CHECKSUM_DELIMITER, NMEA_END_CHAR_1, NMEA_END_CHAR_2,
        NMEA_MAX_BUFFER_SIZE, NMEA_MIN_SENTENCE_LENGTH, NMEA_SYNC_CHAR,
    },
    error::ParserError,
    sentences::{ParsedSentence, Sentence, Talker},
};

pub(crate) mod checksum;

use checksum::{parse_checksum_field, NmeaChecksumCalc};

/// Streaming parser for NMEA-0183 with an internal line buffer.
///
/// Wire chunks rarely line up with sentence boundaries, so everything after the
/// last line terminator is kept until the next call to [`Parser::consume`].
#[derive(Debug)]
pub struct Parser {
    buf: Vec<u8>,
    max_buffer_len: usize,
    last_sentence_at: Option<Instant>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(NMEA_MAX_BUFFER_SIZE)
    }
}

impl Parser {
    /// Create a parser that drops an unterminated line once it grows past `max_buffer_len`.
    pub fn new(max_buffer_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_buffer_len,
            last_sentence_at: None,
        }
    }

    pub fn is_buffer_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn buffer_len(&self) -> usize {
        self.buf.len()
    }

    /// Forget buffered bytes and the data-rate reference point.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.last_sentence_at = None;
    }

    /// Append `new_data` to the internal buffer and return an iterator-like
    /// object over the complete sentences now available.
    pub fn consume<'a>(&'a mut self, new_data: &[u8]) -> ParserIter<'a> {
        self.buf.extend_from_slice(new_data);
        ParserIter { parser: self }
    }

    fn data_rate(&mut self) -> Option<f64> {
        let now = Instant::now();
        let rate = self.last_sentence_at.and_then(|last| {
            let elapsed_ms = now.duration_since(last).as_secs_f64() * 1000.0;
            (elapsed_ms > 0.0).then(|| 1000.0 / elapsed_ms)
        });
        self.last_sentence_at = Some(now);
        rate
    }
}

/// Iterator over the sentences stored in the [`Parser`] buffer
pub struct ParserIter<'a> {
    parser: &'a mut Parser,
}

impl ParserIter<'_> {
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let buf = &mut self.parser.buf;
        loop {
            let end = buf
                .iter()
                .position(|b| *b == NMEA_END_CHAR_1 || *b == NMEA_END_CHAR_2)?;
            let line: Vec<u8> = buf.drain(..=end).take(end).collect();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    #[allow(clippy::should_implement_trait)]
    /// Analog of `core::iter::Iterator::next`; yields one entry per terminated
    /// line, so a malformed sentence never hides the ones after it.
    pub fn next(&mut self) -> Option<Result<ParsedSentence, ParserError>> {
        match self.next_line() {
            Some(line) => Some(parse_line(&line).map(|(talker, sentence, raw)| {
                ParsedSentence {
                    talker,
                    sentence,
                    raw,
                    data_rate: self.parser.data_rate(),
                }
            })),
            None => {
                let len = self.parser.buf.len();
                if len > self.parser.max_buffer_len {
                    self.parser.buf.clear();
                    return Some(Err(ParserError::BufferOverflow { len }));
                }
                None
            },
        }
    }
}

/// Validate a single line and return the sentence body between `$` and `*`.
pub(crate) fn validate(line: &[u8]) -> Result<&str, ParserError> {
    if line.is_empty() {
        return Err(ParserError::Empty);
    }
    let start = sentence_start(line).ok_or(ParserError::MissingStartDelimiter)?;
    let sentence = &line[start..];
    if sentence.len() < NMEA_MIN_SENTENCE_LENGTH {
        return Err(ParserError::TooShort {
            len: sentence.len(),
        });
    }
    let star = sentence
        .iter()
        .rposition(|b| *b == NMEA_CHECKSUM_DELIMITER)
        .ok_or(ParserError::MissingChecksum)?;

    let body = &sentence[1..star];
    let expect = parse_checksum_field(&sentence[star + 1..])?;
    let mut calc = NmeaChecksumCalc::new();
    calc.update(body);
    calc.validate_result(expect)?;

    if !body.is_ascii() {
        return Err(ParserError::InvalidEncoding);
    }
    core::str::from_utf8(body).map_err(|_| ParserError::InvalidEncoding)
}

/// Start of the sentence proper. Binary noise may carry stray `$` bytes, so
/// this is the last `$` in front of the checksum delimiter.
fn sentence_start(line: &[u8]) -> Option<usize> {
    match line.iter().rposition(|b| *b == NMEA_CHECKSUM_DELIMITER) {
        Some(star) => line[..star].iter().rposition(|b| *b == NMEA_SYNC_CHAR),
        None => line.iter().position(|b| *b == NMEA_SYNC_CHAR),
    }
}

fn parse_line(line: &[u8]) -> Result<(Talker, Sentence, String), ParserError> {
    let body = validate(line)?;
    let fields: Vec<&str> = body.split(',').collect();
    let address = fields[0];
    let talker = if address.len() >= NMEA_ADDRESS_LEN {
        Talker::from_id(&address[..2])
    } else {
        Talker::Other(address.to_string())
    };
    let sentence = Sentence::decode(&fields);

    let raw_start = sentence_start(line).unwrap_or_default();
    let raw = String::from_utf8_lossy(&line[raw_start..]).into_owned();
    Ok((talker, sentence, raw))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sentences::SentenceKind;

    const GGA: &[u8] =
        b"$GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,*76\r\n";

    fn collect(mut it: ParserIter<'_>) -> Vec<Result<ParsedSentence, ParserError>> {
        let mut ret = vec![];
        while let Some(item) = it.next() {
            ret.push(item);
        }
        ret
    }

    #[test]
    fn parses_complete_sentence() {
        let mut parser = Parser::default();
        let out = collect(parser.consume(GGA));
        assert_eq!(out.len(), 1);
        let sentence = out[0].as_ref().unwrap();
        assert_eq!(sentence.kind(), SentenceKind::Gga);
        assert_eq!(sentence.talker, Talker::Gps);
        assert_eq!(
            sentence.raw,
            "$GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,*76"
        );
        assert!(parser.is_buffer_empty());
    }

    #[test]
    fn waits_for_terminator() {
        let mut parser = Parser::default();
        let (head, tail) = GGA.split_at(30);
        assert!(collect(parser.consume(head)).is_empty());
        assert_eq!(parser.buffer_len(), 30);
        let out = collect(parser.consume(tail));
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn byte_by_byte() {
        let mut parser = Parser::default();
        let mut found = 0;
        for b in GGA {
            found += collect(parser.consume(&[*b])).len();
        }
        assert_eq!(found, 1);
    }

    #[test]
    fn accepts_lf_and_cr_terminators() {
        let mut parser = Parser::default();
        let mut data = GGA[..GGA.len() - 2].to_vec();
        data.push(b'\n');
        data.extend_from_slice(&GGA[..GGA.len() - 2]);
        data.push(b'\r');
        let out = collect(parser.consume(&data));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(Result::is_ok));
    }

    #[test]
    fn bad_sentence_does_not_abort_batch() {
        let mut parser = Parser::default();
        let mut data = b"$GPGGA,garbage*00\r\n".to_vec();
        data.extend_from_slice(GGA);
        let out = collect(parser.consume(&data));
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(ParserError::InvalidChecksum { .. })));
        assert!(out[1].is_ok());
    }

    #[test]
    fn validation_order() {
        assert_eq!(validate(b""), Err(ParserError::Empty));
        assert_eq!(
            validate(b"GPGGA,1,2,3*00"),
            Err(ParserError::MissingStartDelimiter)
        );
        assert_eq!(validate(b"$GPGGA*0"), Err(ParserError::TooShort { len: 8 }));
        assert_eq!(validate(b"$GPGGA,1,2"), Err(ParserError::MissingChecksum));
        assert_eq!(validate(b"$GPGGA,1,2*X"), Err(ParserError::MalformedChecksum));
    }

    #[test]
    fn leading_noise_is_skipped() {
        let mut line = vec![0xd3, 0x00, b'x'];
        line.extend_from_slice(&GGA[..GGA.len() - 2]);
        assert!(validate(&line).is_ok());
    }

    #[test]
    fn binary_noise_with_sync_char_is_skipped() {
        let mut parser = Parser::default();
        let mut data = vec![0xb5, 0x62, b'$', 0x01];
        data.extend_from_slice(GGA);
        let out = collect(parser.consume(&data));
        assert_eq!(out.len(), 1);
        let sentence = out[0].as_ref().unwrap();
        assert_eq!(sentence.kind(), SentenceKind::Gga);
        assert!(sentence.raw.starts_with("$GPGGA,092750.000,"));
    }

    #[test]
    fn overflow_discards_buffer() {
        let mut parser = Parser::new(16);
        let out = collect(parser.consume(&[b'A'; 32]));
        assert_eq!(out, vec![Err(ParserError::BufferOverflow { len: 32 })]);
        assert!(parser.is_buffer_empty());

        let out = collect(parser.consume(GGA));
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn second_sentence_gets_data_rate() {
        let mut parser = Parser::default();
        let first = collect(parser.consume(GGA));
        assert_eq!(first[0].as_ref().unwrap().data_rate, None);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = collect(parser.consume(GGA));
        let rate = second[0].as_ref().unwrap().data_rate.unwrap();
        assert!(rate > 0.0 && rate <= 500.0, "rate = {rate}");
    }
}
