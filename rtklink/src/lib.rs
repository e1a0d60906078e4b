//! # rtklink
//!
//! Protocol core for relaying RTK corrections to a GNSS receiver: an NMEA-0183 decoder that
//! tracks the receiver's position and satellites, and an NTRIP client that streams RTCM3
//! corrections from a caster back to the receiver while reporting the position as GGA.
//!
//! A complete application wiring a serial port receiver to a caster lives in the
//! `rtklink_cli` folder of this project.
//!
//! Decoding NMEA
//! =============
//!
//! [`NmeaDecoder`] accepts raw chunks in whatever sizes the device transport delivers them.
//! Incomplete sentences are kept until their line terminator arrives; sentences failing the
//! checksum are dropped without affecting the rest of the batch.
//! ```
//! use rtklink::{NmeaDecoder, Sentence};
//!
//! let mut decoder = NmeaDecoder::new();
//! let chunks = [
//!     &b"$GNRMC,123519,A,4807.038,N,01131.0"[..],
//!     &b"00,E,022.4,084.4,230394,003.1,W*74\r\n"[..],
//! ];
//! for chunk in chunks {
//!     for parsed in decoder.feed(chunk) {
//!         if let Sentence::Rmc(rmc) = &parsed.sentence {
//!             assert_eq!(rmc.speed, Some(22.4));
//!         }
//!     }
//! }
//! assert_eq!(decoder.position().map(|p| p.latitude), Some(48.1173));
//! ```
//!
//! The lower level [`Parser`] yields every line, including the reason a sentence was rejected:
//! ```
//! use rtklink::{Parser, ParserError};
//!
//! let mut parser = Parser::default();
//! let mut it = parser.consume(b"$GPGGA,1*00\r\n");
//! match it.next() {
//!     Some(Err(ParserError::InvalidChecksum { expect, got })) => assert_ne!(expect, got),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! Reporting the position
//! ======================
//!
//! ```
//! use rtklink::{encoder::is_valid_gga, GgaEncoder, Position};
//!
//! let sentence = GgaEncoder::default().encode(&Position::new(53.361337, -6.50562));
//! assert!(sentence.starts_with("$GPGGA,"));
//! assert!(is_valid_gga(&sentence));
//! ```
//!
//! Corrections
//! ===========
//!
//! See [`ntrip::NtripClient`]. Connection and correction traffic notifications are typed
//! broadcast channels, see [`events`].

pub use crate::{
    decoder::{NmeaDecoder, SentenceStats},
    encoder::{GgaDefaults, GgaEncoder},
    error::{NtripError, ParserError},
    parser::{Parser, ParserIter},
    position::{Position, PositionStore},
    satellites::{SatelliteRecord, SatelliteTracker},
    sentences::{ParsedSentence, Sentence, SentenceKind, Talker},
};

pub mod constants;
mod decoder;
pub mod encoder;
mod error;
pub mod events;
pub mod ntrip;
mod parser;
mod position;
pub mod rtcm;
mod satellites;
pub mod sentences;
